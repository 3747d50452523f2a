//! The `bgpd` binary's internals: connection handling, the event queue, the
//! per-peer state machine and the shared-Loc-RIB speaker wrapper around it.

pub mod config;
pub mod connection;
pub mod event;
pub mod fsm;
pub mod speaker;

use octavius_bgp_route::RouteError;
use octavius_bgp_wire::WireError;
use thiserror::Error;

/// Errors a peer session can encounter while running. `Io` and `Wire`
/// errors are fatal to the session - per the speaker's propagation policy,
/// the peer task exits; `Installer` errors at ESTABLISHED are logged by the
/// caller and the session continues.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("IO error => {0}")]
    Io(#[from] std::io::Error),
    #[error("wire codec error => {0}")]
    Wire(#[from] WireError),
    #[error("kernel FIB installer error => {0}")]
    Installer(#[from] RouteError),
}
