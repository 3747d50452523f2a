//! Owns the Loc-RIB shared across every peer of one speaker instance.
//! Per the concurrency model, a speaker may run several peers concurrently,
//! all feeding and reading the same Loc-RIB; this binary's `main` only ever
//! builds one, but `Speaker` keeps that extension a matter of constructing
//! more `PeerFsm`s over the same handle rather than a redesign.

use crate::{
    config::PeerConfig,
    fsm::PeerFsm,
    PeerError,
};
use octavius_bgp_common::{
    Asn,
    Ipv4Prefix,
};
use octavius_bgp_rib::LocRib;
use octavius_bgp_route::{
    RoutingTableInstaller,
    RoutingTableLookup,
};
use std::{
    net::Ipv4Addr,
    sync::Arc,
};

pub struct Speaker {
    loc_rib: Arc<LocRib>,
}

impl Speaker {
    /// Builds the speaker's Loc-RIB, originating `originate` (resolved
    /// against the kernel routing table via `lookup`) under AS `local_as`.
    pub async fn new<L: RoutingTableLookup>(
        local_as: Asn,
        local_ip: Ipv4Addr,
        originate: &[Ipv4Prefix],
        lookup: &L,
    ) -> Result<Self, PeerError> {
        let loc_rib = LocRib::new(local_as, local_ip, originate, lookup).await.map_err(PeerError::Installer)?;
        Ok(Self { loc_rib: Arc::new(loc_rib) })
    }

    /// Builds a session for `config` sharing this speaker's Loc-RIB.
    /// Installed routes for this peer's session go through `installer`.
    pub fn peer<I: RoutingTableInstaller>(&self, config: PeerConfig, installer: I) -> PeerFsm<I> {
        PeerFsm::new(config, self.loc_rib.clone(), installer)
    }
}
