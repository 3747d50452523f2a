//! In-memory `RoutingTableInstaller`/`RoutingTableLookup` used by tests and,
//! on non-Linux hosts, by the daemon itself as a logging no-op fallback.

use crate::{
    RouteError,
    RoutingTableInstaller,
    RoutingTableLookup,
};
use log::warn;
use octavius_bgp_common::Ipv4Prefix;
use std::{
    future::Future,
    net::Ipv4Addr,
    sync::Mutex,
};

/// A fake kernel routing table. `lookup` answers from a set of routes seeded
/// at construction (standing in for "this prefix is on-link"); `install`
/// just records what was installed so tests can assert on it.
#[derive(Default)]
pub struct InMemoryRouteTable {
    on_link: Vec<Ipv4Prefix>,
    installed: Mutex<Vec<(Ipv4Prefix, Ipv4Addr)>>,
}

impl InMemoryRouteTable {
    pub fn new(on_link: Vec<Ipv4Prefix>) -> Self {
        Self { on_link, installed: Mutex::new(Vec::new()) }
    }

    pub fn installed_routes(&self) -> Vec<(Ipv4Prefix, Ipv4Addr)> {
        self.installed.lock().expect("installed routes mutex poisoned").clone()
    }
}

impl RoutingTableInstaller for InMemoryRouteTable {
    fn install(&self, prefix: Ipv4Prefix, next_hop: Ipv4Addr) -> impl Future<Output = Result<(), RouteError>> + Send {
        async move {
            self.installed.lock().expect("installed routes mutex poisoned").push((prefix, next_hop));
            Ok(())
        }
    }
}

impl RoutingTableLookup for InMemoryRouteTable {
    fn lookup(&self, prefix: Ipv4Prefix) -> impl Future<Output = Result<Vec<Ipv4Prefix>, RouteError>> + Send {
        let matches = self
            .on_link
            .iter()
            .filter(|route| route.address == prefix.address && route.length == prefix.length)
            .copied()
            .collect::<Vec<_>>();
        async move { Ok(matches) }
    }
}

/// Used in place of [`InMemoryRouteTable`] on non-Linux build targets: it
/// installs nothing and reports no on-link routes, but logs so the gap is
/// visible rather than silent.
#[derive(Default)]
pub struct NullRouteTable;

impl RoutingTableInstaller for NullRouteTable {
    fn install(&self, prefix: Ipv4Prefix, next_hop: Ipv4Addr) -> impl Future<Output = Result<(), RouteError>> + Send {
        async move {
            warn!("No kernel FIB installer for this platform; not installing {prefix} via {next_hop}");
            Ok(())
        }
    }
}

impl RoutingTableLookup for NullRouteTable {
    fn lookup(&self, prefix: Ipv4Prefix) -> impl Future<Output = Result<Vec<Ipv4Prefix>, RouteError>> + Send {
        async move {
            warn!("No kernel routing table lookup for this platform; treating {prefix} as unresolved");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_records_every_call() {
        let table = InMemoryRouteTable::default();
        table.install("10.0.0.0/8".parse().unwrap(), Ipv4Addr::new(10, 0, 0, 1)).await.unwrap();
        assert_eq!(table.installed_routes().len(), 1);
    }

    #[tokio::test]
    async fn lookup_returns_seeded_on_link_routes() {
        let prefix: Ipv4Prefix = "10.100.220.0/24".parse().unwrap();
        let table = InMemoryRouteTable::new(vec![prefix]);
        assert_eq!(table.lookup(prefix).await.unwrap(), vec![prefix]);
        assert!(table.lookup("10.0.0.0/8".parse().unwrap()).await.unwrap().is_empty());
    }
}
