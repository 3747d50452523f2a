//! Traits for touching the kernel routing table, kept behind an interface so
//! the blocking netlink syscalls never leak into the RIB pipeline or the
//! FSM, and so tests can substitute an in-memory fake.

#[cfg(target_os = "linux")] pub mod linux;
pub mod fake;

use octavius_bgp_common::Ipv4Prefix;
use std::{
    future::Future,
    io,
    net::Ipv4Addr,
    sync::Arc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("IO error => {0}")]
    Io(#[from] io::Error),

    #[cfg(target_os = "linux")]
    #[error("netlink error => {0}")]
    Netlink(#[from] rtnetlink::Error),
}

/// Installs a learned route into the kernel FIB. Installation is
/// best-effort and additive: installing the same prefix/next-hop twice may
/// fail, and that failure is surfaced rather than swallowed.
pub trait RoutingTableInstaller: Send + Sync {
    fn install(&self, prefix: Ipv4Prefix, next_hop: Ipv4Addr) -> impl Future<Output = Result<(), RouteError>> + Send;
}

/// Looks up the kernel routes whose destination contains a configured
/// prefix's network address - used once, at Loc-RIB construction, to
/// resolve a configured `<prefix>/<len>` against a real on-link route.
pub trait RoutingTableLookup: Send + Sync {
    fn lookup(&self, prefix: Ipv4Prefix) -> impl Future<Output = Result<Vec<Ipv4Prefix>, RouteError>> + Send;
}

impl<T: RoutingTableInstaller + ?Sized> RoutingTableInstaller for Arc<T> {
    fn install(&self, prefix: Ipv4Prefix, next_hop: Ipv4Addr) -> impl Future<Output = Result<(), RouteError>> + Send {
        (**self).install(prefix, next_hop)
    }
}

impl<T: RoutingTableLookup + ?Sized> RoutingTableLookup for Arc<T> {
    fn lookup(&self, prefix: Ipv4Prefix) -> impl Future<Output = Result<Vec<Ipv4Prefix>, RouteError>> + Send {
        (**self).lookup(prefix)
    }
}
