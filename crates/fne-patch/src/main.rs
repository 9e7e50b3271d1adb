// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Talkgroup patch engine binary.
//!
//! Runs two read loops (spec.md §5): one against the DVM FNE the patch
//! logs into as a specialised peer, one against an external MMDVM-gateway
//! P25 peer when `mmdvm_reflector` is set.

use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dmr_p25_core::model::AlgorithmId;
use dmr_p25_core::p25::consts::{Lco, RAW_IMBE_LENGTH_BYTES};
use dmr_p25_core::p25::ldu::{EncryptionSync, Ldu1Frame, Ldu2Frame};
use dmr_p25_core::p25::lc::{LcBody, LinkControl};
use fne_patch::kmm;
use fne_patch::{PatchConfig, PatchDirection, PatchEngine};
use fne_transport::frame::{build_datagram, parse_datagram, FneHeader, NetFunc, NetSubfunc, RtpHeader};
use fne_patch::reflector;

#[derive(Parser, Debug)]
#[command(name = "fne-patch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Patch configuration file (YAML format).
    #[arg(short, long)]
    config: PathBuf,

    /// Peer ID this patch logs into the FNE as.
    #[arg(long, default_value_t = 900_100)]
    peer_id: u32,

    /// FNE repeater login password.
    #[arg(long)]
    password: Option<String>,
}

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const LOGIN_ATTEMPTS: u32 = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PatchConfig::from_file(&args.config)?;
    config.validate()?;
    let password = args.password.clone().unwrap_or_default();

    let mut src_dir = PatchDirection::new(config.src_tgid, config.src_slot);
    if let Some(key) = &config.src_key {
        let algorithm = AlgorithmId::from_wire(key.algorithm);
        match key.key_bytes()? {
            Some(bytes) => src_dir.load_tek(algorithm, bytes, key.key_id)?,
            None => src_dir.mark_awaiting_key(algorithm, key.key_id),
        }
    }
    let mut dst_dir = PatchDirection::new(config.dst_tgid, config.dst_slot);
    if let Some(key) = &config.dst_key {
        let algorithm = AlgorithmId::from_wire(key.algorithm);
        match key.key_bytes()? {
            Some(bytes) => dst_dir.load_tek(algorithm, bytes, key.key_id)?,
            None => dst_dir.mark_awaiting_key(algorithm, key.key_id),
        }
    }
    let engine = Arc::new(Mutex::new(PatchEngine::new(src_dir, dst_dir)));

    let fne_socket = UdpSocket::bind("0.0.0.0:0")?;
    fne_socket.connect(&config.fne_addr)?;
    fne_socket.set_read_timeout(Some(READ_TIMEOUT))?;
    login_to_fne(&fne_socket, args.peer_id, password.as_bytes())?;
    info!("patch logged into FNE {} as peer {}", config.fne_addr, args.peer_id);

    // spec.md §4.7: request any configured-but-unknown TEK before serving
    // traffic; audio for that direction is withheld until the key arrives.
    for (algorithm, key_id) in engine.lock().take_pending_key_requests() {
        let body = kmm::encode_inventory_cmd(algorithm, key_id);
        send_kmm(&fne_socket, args.peer_id, &body)?;
        info!("requested TEK over KMM: algorithm {algorithm:?} key_id {key_id}");
    }

    let mmdvm_socket = if config.mmdvm_reflector {
        let addr = config.mmdvm_addr.clone().expect("validated: mmdvm_addr required");
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(&addr)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Some(socket)
    } else {
        None
    };

    let dvm_handle = {
        let engine = Arc::clone(&engine);
        let socket = fne_socket.try_clone()?;
        let peer_id = args.peer_id;
        std::thread::spawn(move || dvm_read_loop(socket, engine, peer_id))
    };

    let mmdvm_handle = mmdvm_socket.map(|socket| {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || mmdvm_read_loop(socket, engine))
    });

    dvm_handle.join().ok();
    if let Some(handle) = mmdvm_handle {
        handle.join().ok();
    }
    Ok(())
}

fn login_to_fne(socket: &UdpSocket, peer_id: u32, password: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    send(socket, peer_id, NetFunc::Rptl, 0, &[])?;
    let salt = expect_ack_body(socket, LOGIN_ATTEMPTS)?;

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password);
    let digest = hasher.finalize();
    send(socket, peer_id, NetFunc::Rptk, 0, &digest)?;
    expect_ack_body(socket, LOGIN_ATTEMPTS)?;

    let config_body = br#"{"software":"fne-patch"}"#;
    send(socket, peer_id, NetFunc::Rptc, 0, config_body)?;
    expect_ack_body(socket, LOGIN_ATTEMPTS)?;
    Ok(())
}

fn send(socket: &UdpSocket, peer_id: u32, function: NetFunc, stream_id: u32, body: &[u8]) -> std::io::Result<()> {
    let rtp = RtpHeader { marker: false, payload_type: 0, sequence: 0, timestamp: 0, ssrc: peer_id };
    let header = FneHeader { function, subfunction: 0, peer_id, stream_id };
    let datagram = build_datagram(&rtp, &header, body);
    socket.send(&datagram)?;
    Ok(())
}

fn send_kmm(socket: &UdpSocket, peer_id: u32, body: &[u8]) -> std::io::Result<()> {
    let rtp = RtpHeader { marker: false, payload_type: 0, sequence: 0, timestamp: 0, ssrc: peer_id };
    let header = FneHeader {
        function: NetFunc::Protocol,
        subfunction: NetSubfunc::ProtocolKmm.to_wire(),
        peer_id,
        stream_id: 0,
    };
    let datagram = build_datagram(&rtp, &header, body);
    socket.send(&datagram)
}

fn expect_ack_body(socket: &UdpSocket, attempts: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut buf = [0u8; 2048];
    for _ in 0..attempts {
        match socket.recv(&mut buf) {
            Ok(len) => {
                let datagram = parse_datagram(&buf[..len])?;
                match datagram.header.function {
                    NetFunc::Ack => return Ok(datagram.body),
                    NetFunc::Nak => return Err("FNE rejected patch login".into()),
                    _ => {}
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err("timed out waiting for FNE acknowledgement".into())
}

fn dvm_read_loop(socket: UdpSocket, engine: Arc<Mutex<PatchEngine>>, peer_id: u32) {
    let mut buf = [0u8; 2048];
    loop {
        match socket.recv(&mut buf) {
            Ok(len) => {
                let Ok(datagram) = parse_datagram(&buf[..len]) else {
                    continue;
                };
                if datagram.header.function != NetFunc::Protocol {
                    continue;
                }
                if datagram.header.subfunction == NetSubfunc::ProtocolKmm.to_wire() {
                    if let Ok(message) = kmm::decode(&datagram.body) {
                        if let Err(e) = engine.lock().handle_kmm(&message) {
                            warn!("failed to apply KMM key delivery: {e}");
                        }
                    }
                    continue;
                }
                if datagram.header.subfunction != NetSubfunc::ProtocolP25.to_wire() {
                    continue;
                }
                let stream_id = datagram.header.stream_id;
                let mut engine = engine.lock();
                if !engine.is_ready() {
                    continue;
                }
                if let Some(frame) = decode_ldu1(&datagram.body) {
                    if let Ok(forwarded) = engine.forward_ldu1(&frame, stream_id, now_ms()) {
                        let body = encode_ldu1(&forwarded);
                        let _ = send(&socket, peer_id, NetFunc::Protocol, stream_id, &body);
                    }
                } else if let Some(frame) = decode_ldu2(&datagram.body) {
                    if let Ok(forwarded) = engine.forward_ldu2(&frame) {
                        let body = encode_ldu2(&forwarded);
                        let _ = send(&socket, peer_id, NetFunc::Protocol, stream_id, &body);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => warn!("DVM-side read error: {e}"),
        }
    }
}

fn mmdvm_read_loop(socket: UdpSocket, engine: Arc<Mutex<PatchEngine>>) {
    let mut asm = reflector::RecordSetAssembler::new();
    let mut buf = [0u8; 128];
    loop {
        match socket.recv(&mut buf) {
            Ok(len) => match reflector::decode_record(&buf[..len]) {
                Ok(reflector::MmdvmRecord::EndOfCall) => {
                    engine.lock().end_call(now_ms());
                    info!("mmdvm gateway signalled end of call");
                }
                Ok(reflector::MmdvmRecord::Ldu1 { tag, imbe }) => {
                    if let Some(imbe) = asm.feed_ldu1(tag, imbe) {
                        let lc = LinkControl::new(
                            Lco::GroupVoice,
                            LcBody::GroupVoice { svc_options: 0, dst_tgid: 0, src_id: 0 },
                        );
                        let frame = Ldu1Frame { imbe, lc };
                        let mut engine = engine.lock();
                        if engine.is_ready() {
                            if let Ok(forwarded) = engine.forward_ldu1(&frame, 0, now_ms()) {
                                let records = reflector::encode_ldu1(&forwarded, 0, 0, false);
                                for record in records {
                                    let _ = socket.send(&record);
                                }
                            }
                        }
                    }
                }
                Ok(reflector::MmdvmRecord::Ldu2 { tag, imbe }) => {
                    if let (0x6D | 0x6E | 0x6F | 0x70, true) = (tag, len >= 4) {
                        if tag == 0x70 {
                            asm.feed_ldu2_key(AlgorithmId::from_wire(buf[1]), (u16::from(buf[2]) << 8) | u16::from(buf[3]));
                        } else {
                            let mut frag = [0u8; 3];
                            frag.copy_from_slice(&buf[1..4]);
                            asm.feed_ldu2_mi_fragment(tag, &frag);
                        }
                    }
                    if let Some((imbe, enc_sync)) = asm.feed_ldu2(tag, imbe) {
                        let frame = Ldu2Frame { imbe, enc_sync };
                        let mut engine = engine.lock();
                        if engine.is_ready() {
                            if let Ok(forwarded) = engine.forward_ldu2(&frame) {
                                let records = reflector::encode_ldu2(&forwarded, 0, 0, false);
                                for record in records {
                                    let _ = socket.send(&record);
                                }
                            }
                        }
                    }
                }
                Err(e) => warn!("malformed mmdvm reflector record: {e}"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => warn!("mmdvm-side read error: {e}"),
        }
    }
}

fn now_ms() -> u64 {
    static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let epoch = EPOCH.get_or_init(std::time::Instant::now);
    epoch.elapsed().as_millis() as u64
}

/// Application-level wire body for an LDU1 frame carried between the patch
/// engine and its FNE peer: this crate's patch-to-FNE link runs above the
/// DMR/P25 bitstream codec, so it exchanges already-decoded frame contents
/// rather than re-deriving them from raw air bits each hop.
fn encode_ldu1(frame: &Ldu1Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 1 + 1 + 2 + 4 + 9 * RAW_IMBE_LENGTH_BYTES);
    out.push(1);
    let (lco, dst_tgid, src_id) = match frame.lc.body {
        LcBody::GroupVoice { dst_tgid, src_id, .. } => (frame.lc.lco.to_wire(), dst_tgid, src_id),
        _ => (frame.lc.lco.to_wire(), 0, 0),
    };
    out.push(lco);
    out.push(frame.lc.mfid);
    out.extend_from_slice(&dst_tgid.to_be_bytes());
    out.extend_from_slice(&src_id.to_be_bytes());
    for codeword in &frame.imbe {
        out.extend_from_slice(codeword);
    }
    out
}

fn decode_ldu1(body: &[u8]) -> Option<Ldu1Frame> {
    const LEN: usize = 1 + 1 + 1 + 2 + 4 + 9 * RAW_IMBE_LENGTH_BYTES;
    if body.len() != LEN || body[0] != 1 {
        return None;
    }
    let lco = dmr_p25_core::p25::consts::Lco::from_wire(body[1]);
    let mfid = body[2];
    let dst_tgid = u16::from_be_bytes([body[3], body[4]]);
    let src_id = u32::from_be_bytes([body[5], body[6], body[7], body[8]]);
    let mut imbe: [[u8; RAW_IMBE_LENGTH_BYTES]; 9] = Default::default();
    for (i, chunk) in body[9..].chunks_exact(RAW_IMBE_LENGTH_BYTES).enumerate() {
        imbe[i].copy_from_slice(chunk);
    }
    let mut lc = LinkControl::new(lco, LcBody::GroupVoice { svc_options: 0, dst_tgid, src_id });
    lc.mfid = mfid;
    Some(Ldu1Frame { imbe, lc })
}

fn encode_ldu2(frame: &Ldu2Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 9 + 1 + 2 + 9 * RAW_IMBE_LENGTH_BYTES);
    out.push(2);
    out.extend_from_slice(frame.enc_sync.mi.as_bytes());
    out.push(frame.enc_sync.algorithm.to_wire());
    out.extend_from_slice(&frame.enc_sync.key_id.to_be_bytes());
    for codeword in &frame.imbe {
        out.extend_from_slice(codeword);
    }
    out
}

fn decode_ldu2(body: &[u8]) -> Option<Ldu2Frame> {
    const LEN: usize = 1 + 9 + 1 + 2 + 9 * RAW_IMBE_LENGTH_BYTES;
    if body.len() != LEN || body[0] != 2 {
        return None;
    }
    let mut mi_bytes = [0u8; 9];
    mi_bytes.copy_from_slice(&body[1..10]);
    let algorithm = AlgorithmId::from_wire(body[10]);
    let key_id = u16::from_be_bytes([body[11], body[12]]);
    let mut imbe: [[u8; RAW_IMBE_LENGTH_BYTES]; 9] = Default::default();
    for (i, chunk) in body[13..].chunks_exact(RAW_IMBE_LENGTH_BYTES).enumerate() {
        imbe[i].copy_from_slice(chunk);
    }
    Some(Ldu2Frame {
        imbe,
        enc_sync: EncryptionSync { mi: dmr_p25_core::crypto::Mi::new(mi_bytes), algorithm, key_id },
    })
}
