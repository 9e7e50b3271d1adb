// SPDX-License-Identifier: Apache-2.0 OR MIT

//! FNE call-routing server: peer lifecycle, affiliation/grant tables, and
//! TG/RID ACL enforcement (spec.md §4.6-§4.7, component C7).

pub mod acl;
pub mod affiliation;
pub mod config;
pub mod grant;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use router::{Protocol, RoutingCore};
pub use server::{FneServer, ServerError};
