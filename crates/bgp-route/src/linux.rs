//! Linux netlink backend for [`crate::RoutingTableInstaller`] and
//! [`crate::RoutingTableLookup`].

use crate::{
    RouteError,
    RoutingTableInstaller,
    RoutingTableLookup,
};
use futures_util::TryStreamExt;
use log::debug;
use netlink_packet_route::{
    route::{
        RouteAddress,
        RouteAttribute,
        RouteMessage,
    },
    AddressFamily,
};
use octavius_bgp_common::Ipv4Prefix;
use rtnetlink::{
    new_connection,
    Handle,
    IpVersion,
};
use std::{
    future::Future,
    net::Ipv4Addr,
};
use tokio::task::JoinHandle;

/// Owns a netlink socket and its background connection task. Routes
/// installed through this table are additive - re-installing an existing
/// prefix/next-hop pair may return an error from the kernel, which is
/// propagated rather than swallowed.
pub struct LinuxRouteTable {
    handle: Handle,
    _connection_task: JoinHandle<()>,
}

impl LinuxRouteTable {
    pub fn new() -> Result<Self, RouteError> {
        let (connection, handle, _) = new_connection()?;
        let connection_task = tokio::spawn(connection);
        Ok(Self { handle, _connection_task: connection_task })
    }
}

impl RoutingTableInstaller for LinuxRouteTable {
    fn install(&self, prefix: Ipv4Prefix, next_hop: Ipv4Addr) -> impl Future<Output = Result<(), RouteError>> + Send {
        async move {
            debug!("Installing route {prefix} via {next_hop} into the kernel FIB");
            self.handle
                .route()
                .add()
                .v4()
                .destination_prefix(prefix.address, prefix.length)
                .gateway(next_hop)
                .execute()
                .await?;
            Ok(())
        }
    }
}

impl RoutingTableLookup for LinuxRouteTable {
    fn lookup(&self, prefix: Ipv4Prefix) -> impl Future<Output = Result<Vec<Ipv4Prefix>, RouteError>> + Send {
        async move {
            let mut routes = self.handle.route().get(IpVersion::V4).execute();
            let mut matches = Vec::new();
            while let Some(route) = routes.try_next().await? {
                if let Some(found) = route_contains(&route, prefix.address) {
                    matches.push(found);
                }
            }
            Ok(matches)
        }
    }
}

fn route_contains(route: &RouteMessage, address: Ipv4Addr) -> Option<Ipv4Prefix> {
    if route.header.address_family != AddressFamily::Inet {
        return None;
    }

    let destination = route.attributes.iter().find_map(|attribute| match attribute {
        RouteAttribute::Destination(RouteAddress::Inet(addr)) => Some(*addr),
        _ => None,
    })?;

    let length = route.header.destination_prefix_length;
    let candidate = Ipv4Prefix::new(destination, length).ok()?;
    let masked = Ipv4Prefix::new(address, length).ok()?;
    (candidate.address == masked.address).then_some(candidate)
}
