// SPDX-License-Identifier: Apache-2.0 OR MIT

//! FNE server core: owns the peer table and routing core, drives the
//! blocking UDP read loop and the maintenance tick (spec.md §5
//! "Scheduling model": "one socket-reader thread ... one clock thread
//! drives pings/timers").

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use ring::rand::{SecureRandom, SystemRandom};

use fne_transport::frame::{build_datagram, parse_datagram, FneHeader, FrameError, NetFunc, RtpHeader};
use fne_transport::peer::{NakTag, Peer, PeerError, PeerState};
use fne_transport::queue::PeerQueue;

use crate::config::ServerConfig;
use crate::router::RoutingCore;

struct PeerSession {
    peer: Peer,
    addr: SocketAddr,
    queue: PeerQueue,
}

/// FNE server: one `UdpSocket`, a peer table, and the routing core shared
/// across the read thread and the maintenance thread.
#[derive(Clone)]
pub struct FneServer {
    config: Arc<ServerConfig>,
    socket: Arc<UdpSocket>,
    peers: Arc<RwLock<HashMap<u32, PeerSession>>>,
    routing: Arc<Mutex<RoutingCore>>,
    running: Arc<AtomicBool>,
}

/// Server error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("bind error: {0}")]
    Bind(String),
    #[error("server already running")]
    AlreadyRunning,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const SOCKET_READ_TIMEOUT: Duration = Duration::from_millis(1);
const WRITER_TICK: Duration = Duration::from_millis(5);

impl FneServer {
    /// Bind the server's UDP socket and build its initial (empty) tables.
    ///
    /// # Errors
    /// Returns [`ServerError::Config`] if `config.validate()` fails, or
    /// [`ServerError::Bind`] if the socket cannot be bound.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|e| ServerError::Config(e.to_string()))?;

        let addr = format!("{}:{}", config.bind_address, config.port);
        let socket = UdpSocket::bind(&addr).map_err(|e| ServerError::Bind(e.to_string()))?;
        socket.set_read_timeout(Some(SOCKET_READ_TIMEOUT))?;

        Ok(Self {
            config: Arc::new(config),
            socket: Arc::new(socket),
            peers: Arc::new(RwLock::new(HashMap::new())),
            routing: Arc::new(Mutex::new(RoutingCore::new())),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn routing(&self) -> Arc<Mutex<RoutingCore>> {
        self.routing.clone()
    }

    /// Run the read loop and the maintenance tick until [`shutdown`](Self::shutdown)
    /// is called. Blocks the calling thread.
    ///
    /// # Errors
    /// Returns [`ServerError::AlreadyRunning`] on reentrant calls, or an
    /// I/O error from the socket.
    pub fn run(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let maintenance_handle = {
            let server = self.clone();
            std::thread::spawn(move || server.maintenance_loop())
        };
        let writer_handle = {
            let server = self.clone();
            std::thread::spawn(move || server.writer_loop())
        };

        let mut buf = [0u8; 2048];
        while self.running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => self.handle_datagram(&buf[..len], from),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => log::warn!("UDP read error: {e}"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        let _ = maintenance_handle.join();
        let _ = writer_handle.join();
        Ok(())
    }

    /// Signal the read/maintenance/writer loops to stop.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn now_ms() -> u64 {
        static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_millis() as u64
    }

    fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let datagram = match parse_datagram(bytes) {
            Ok(d) => d,
            Err(FrameError::TooShort { .. } | FrameError::BadRtpVersion(_)) => {
                log::warn!("dropping malformed datagram from {from}");
                return;
            }
        };
        let peer_id = datagram.header.peer_id;

        match datagram.header.function {
            NetFunc::Rptl => self.handle_rptl(peer_id, from),
            NetFunc::Rptk => self.handle_rptk(peer_id, &datagram.body),
            NetFunc::Rptc => self.handle_rptc(peer_id, &datagram.body),
            NetFunc::Ping => self.handle_ping(peer_id),
            NetFunc::RptClosing => self.handle_closing(peer_id),
            other => log::debug!("unhandled function {other:?} from peer {peer_id}"),
        }
    }

    fn handle_rptl(&self, peer_id: u32, addr: SocketAddr) {
        let mut peers = self.peers.write();
        if peers.len() >= self.config.max_peers && !peers.contains_key(&peer_id) {
            log::warn!("rejecting login from peer {peer_id}: max_peers reached");
            return;
        }
        let mut salt_bytes = [0u8; 4];
        SystemRandom::new()
            .fill(&mut salt_bytes)
            .expect("system RNG failed to generate login salt");
        let salt = u32::from_be_bytes(salt_bytes);
        let peer = Peer::login(peer_id, salt);
        peers.insert(
            peer_id,
            PeerSession {
                peer,
                addr,
                queue: PeerQueue::new(self.config.queue_depth),
            },
        );
        drop(peers);
        self.reply_ack(peer_id, &salt.to_be_bytes());
        log::info!("peer {peer_id} login from {addr}, state -> WaitingAuth");
    }

    fn handle_rptk(&self, peer_id: u32, digest: &[u8]) {
        let mut peers = self.peers.write();
        let Some(session) = peers.get_mut(&peer_id) else {
            log::warn!("RPTK from unknown peer {peer_id}");
            return;
        };
        match session.peer.authenticate(digest, self.config.password.as_bytes()) {
            Ok(()) => {
                drop(peers);
                self.reply_ack(peer_id, &[]);
            }
            Err(PeerError { tag, .. }) => {
                peers.remove(&peer_id);
                drop(peers);
                self.reply_nak(peer_id, tag);
                self.routing.lock().destroy_peer(peer_id);
                log::warn!("peer {peer_id} authentication failed, destroyed");
            }
        }
    }

    fn handle_rptc(&self, peer_id: u32, body: &[u8]) {
        let mut peers = self.peers.write();
        let Some(session) = peers.get_mut(&peer_id) else {
            log::warn!("RPTC from unknown peer {peer_id}");
            return;
        };
        match session.peer.configure(body) {
            Ok(()) => {
                drop(peers);
                self.reply_ack(peer_id, &[]);
                log::info!("peer {peer_id} configured, state -> Running");
            }
            Err(PeerError { tag, .. }) => {
                peers.remove(&peer_id);
                drop(peers);
                self.reply_nak(peer_id, tag);
                self.routing.lock().destroy_peer(peer_id);
            }
        }
    }

    fn handle_ping(&self, peer_id: u32) {
        let mut peers = self.peers.write();
        let Some(session) = peers.get_mut(&peer_id) else {
            log::warn!("PING from unknown peer {peer_id}");
            return;
        };
        session.peer.record_ping(Self::now_ms());
        drop(peers);
        self.reply(peer_id, NetFunc::Pong, &[]);
    }

    fn handle_closing(&self, peer_id: u32) {
        let mut peers = self.peers.write();
        if let Some(mut session) = peers.remove(&peer_id) {
            session.peer.close();
        }
        drop(peers);
        self.routing.lock().destroy_peer(peer_id);
        log::info!("peer {peer_id} closed");
    }

    fn reply_ack(&self, peer_id: u32, body: &[u8]) {
        self.reply(peer_id, NetFunc::Ack, body);
    }

    fn reply_nak(&self, peer_id: u32, tag: NakTag) {
        log::warn!("NAK {} to peer {peer_id}", tag.as_str());
        self.reply(peer_id, NetFunc::Nak, &[]);
    }

    fn reply(&self, peer_id: u32, function: NetFunc, body: &[u8]) {
        let peers = self.peers.read();
        let Some(session) = peers.get(&peer_id) else {
            return;
        };
        let rtp = RtpHeader {
            marker: false,
            payload_type: 0,
            sequence: 0,
            timestamp: 0,
            ssrc: peer_id,
        };
        let header = FneHeader {
            function,
            subfunction: 0,
            peer_id,
            stream_id: 0,
        };
        let datagram = build_datagram(&rtp, &header, body);
        if let Err(e) = self.socket.send_to(&datagram, session.addr) {
            log::warn!("send to peer {peer_id} failed: {e}");
        }
    }

    /// Enqueue `datagram` for delivery to `peer_id`'s bounded outgoing
    /// queue, used for forwarded voice/data traffic rather than direct
    /// control-plane replies.
    pub fn enqueue(&self, peer_id: u32, datagram: Vec<u8>) {
        let mut peers = self.peers.write();
        if let Some(session) = peers.get_mut(&peer_id) {
            session.queue.push(datagram);
        }
    }

    fn writer_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            let mut sends = Vec::new();
            {
                let mut peers = self.peers.write();
                for session in peers.values_mut() {
                    if let Some(datagram) = session.queue.pop() {
                        sends.push((session.addr, datagram));
                    }
                }
            }
            for (addr, datagram) in sends {
                if let Err(e) = self.socket.send_to(&datagram, addr) {
                    log::warn!("writer send to {addr} failed: {e}");
                }
            }
            std::thread::sleep(WRITER_TICK);
        }
    }

    fn maintenance_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            std::thread::sleep(self.config.ping_time());
            self.run_maintenance_tick();
        }
    }

    fn run_maintenance_tick(&self) {
        let now = Self::now_ms();
        let expired_peers: Vec<u32> = {
            let peers = self.peers.read();
            peers
                .iter()
                .filter(|(_, s)| {
                    s.peer.state == PeerState::Running
                        && s.peer.is_ping_expired(now, self.config.ping_time_ms, self.config.max_missed_pings)
                })
                .map(|(&id, _)| id)
                .collect()
        };
        if !expired_peers.is_empty() {
            let mut peers = self.peers.write();
            let mut routing = self.routing.lock();
            for peer_id in &expired_peers {
                peers.remove(peer_id);
                routing.destroy_peer(*peer_id);
                log::warn!("peer {peer_id} removed: ping timeout");
            }
        }

        let released = self.routing.lock().expire_hung_grants(now, self.config.hang_time_ms);
        for tgid in released {
            log::info!("grant for TG {tgid} released: hang-time expiry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        }
    }

    #[test]
    fn bind_succeeds_on_ephemeral_port() {
        let server = FneServer::bind(test_config()).unwrap();
        assert_eq!(server.peers.read().len(), 0);
    }

    #[test]
    fn bind_rejects_invalid_config() {
        let config = ServerConfig {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            max_peers: 0,
            ..Default::default()
        };
        assert!(FneServer::bind(config).is_err());
    }
}
