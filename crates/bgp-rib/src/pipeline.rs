//! The three RIBs and the propagation rules connecting them: received
//! UPDATEs into Adj-RIB-In, Adj-RIB-In into Loc-RIB (subject to AS-path loop
//! prevention and kernel FIB install), and Loc-RIB into each peer's
//! Adj-RIB-Out (subject to the same loop check against the receiving peer).

use crate::entry::originated_attributes;
use crate::{
    AttributeList,
    Rib,
    RibEntry,
};
use log::{
    debug,
    warn,
};
use octavius_bgp_common::{
    Asn,
    Ipv4Prefix,
};
use octavius_bgp_route::{
    RouteError,
    RoutingTableInstaller,
    RoutingTableLookup,
};
use octavius_bgp_wire::UpdateMessage;
use std::net::Ipv4Addr;

/// Routes as received from one peer, before any loop check or FIB install.
/// Withdrawn routes named in an UPDATE are logged and otherwise ignored -
/// this speaker never removes a route once learned (see the design notes).
pub struct AdjRibIn {
    rib: Rib,
}

impl AdjRibIn {
    pub fn new() -> Self {
        Self { rib: Rib::new() }
    }

    pub async fn routes(&self) -> Vec<RibEntry> {
        self.rib.routes().await
    }

    /// Installs every NLRI carried in `update` as a new Adj-RIB-In entry,
    /// all sharing one `AttributeList` built from the UPDATE's path
    /// attributes. Returns whether anything was newly inserted.
    pub async fn install_from_update(&self, update: &UpdateMessage) -> bool {
        for withdrawn in &update.withdrawn_routes {
            warn!("Ignoring withdrawal of {withdrawn}: withdrawn routes are not supported");
        }

        let attributes = AttributeList::new(update.path_attributes.clone());
        let candidates = update
            .nlri
            .iter()
            .map(|prefix| RibEntry::new(*prefix, attributes.clone()))
            .collect();
        self.rib.insert_filtered(candidates, |_| false).await
    }
}

/// The speaker's single local routing table: routes it originates itself,
/// plus everything learned from any peer that survives the AS-path loop
/// check against this speaker's own AS number. Shared by every peer task.
pub struct LocRib {
    rib: Rib,
    local_as: Asn,
}

impl LocRib {
    /// Resolves each `configured` prefix against the kernel's routing table
    /// via `lookup`: a prefix with no matching on-link route is skipped
    /// rather than originated, since advertising a route this speaker can't
    /// itself reach would be a lie to its peers.
    pub async fn new<L: RoutingTableLookup>(
        local_as: Asn,
        local_ip: Ipv4Addr,
        configured: &[Ipv4Prefix],
        lookup: &L,
    ) -> Result<Self, RouteError> {
        let rib = Rib::new();
        for prefix in configured {
            let resolved = lookup.lookup(*prefix).await?;
            if resolved.is_empty() {
                warn!("Skipping configured originate prefix {prefix}: no matching on-link route");
                continue;
            }
            let attributes = originated_attributes(local_ip);
            for route in resolved {
                rib.insert(RibEntry::new(route, attributes.clone())).await;
            }
        }
        Ok(Self { rib, local_as })
    }

    pub async fn routes(&self) -> Vec<RibEntry> {
        self.rib.routes().await
    }

    pub async fn contains_new(&self) -> bool {
        self.rib.contains_new().await
    }

    pub async fn mark_all_unchanged(&self) {
        self.rib.mark_all_unchanged().await
    }

    /// Copies every entry from `adj_in` into this Loc-RIB whose `AS_PATH`
    /// does not already contain this speaker's own AS number, installing
    /// each newly accepted route into the kernel FIB via `installer` while
    /// holding the RIB lock for the whole insert-then-install sequence.
    /// Returns whether anything was newly accepted.
    pub async fn install_from_in<I: RoutingTableInstaller>(&self, adj_in: &AdjRibIn, installer: &I) -> Result<bool, RouteError> {
        let candidates = adj_in.routes().await;
        let local_as = self.local_as;
        self.rib
            .insert_filtered_with_fib(candidates, |entry| {
                let looped = entry.contains_as(local_as);
                if looped {
                    debug!("Rejecting {} from Loc-RIB: AS_PATH already contains {}", entry.prefix, local_as);
                }
                looped
            }, installer)
            .await
    }
}

/// Routes queued for advertisement to one specific peer: every Loc-RIB
/// entry whose `AS_PATH` does not already contain that peer's AS number
/// (split-horizon-by-AS, standing in for a full path-vector loop check).
pub struct AdjRibOut {
    rib: Rib,
}

impl AdjRibOut {
    pub fn new() -> Self {
        Self { rib: Rib::new() }
    }

    /// Copies every entry from `loc` into this Adj-RIB-Out not already
    /// destined to loop back through `remote_as`. Returns whether anything
    /// was newly queued.
    pub async fn install_from_loc(&self, loc: &LocRib, remote_as: Asn) -> bool {
        let candidates = loc.routes().await;
        self.rib
            .insert_filtered(candidates, |entry| entry.contains_as(remote_as))
            .await
    }

    /// Groups every currently queued route by shared `AttributeList`
    /// identity, rewrites each group's attributes in place for `local_ip`/
    /// `local_as`, and returns one UPDATE message per group. A later call
    /// after the same entries have already been grouped here once re-rewrites
    /// (and so re-prepends `local_as` to) the same shared attribute list -
    /// see the design notes on the FSM's `New` flag bookkeeping.
    pub async fn to_update_messages(&self, local_ip: Ipv4Addr, local_as: Asn) -> Vec<UpdateMessage> {
        let routes = self.rib.routes().await;
        let mut groups: Vec<(AttributeList, Vec<Ipv4Prefix>)> = Vec::new();
        for entry in routes {
            match groups.iter_mut().find(|(attributes, _)| attributes.ptr_eq(&entry.attributes)) {
                Some((_, prefixes)) => prefixes.push(entry.prefix),
                None => groups.push((entry.attributes, vec![entry.prefix])),
            }
        }

        groups
            .into_iter()
            .map(|(attributes, nlri)| {
                attributes.rewrite_for_peer(local_ip, local_as);
                UpdateMessage { withdrawn_routes: Vec::new(), path_attributes: attributes.snapshot(), nlri }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octavius_bgp_route::fake::InMemoryRouteTable;
    use octavius_bgp_wire::{
        AsPath,
        Origin,
        PathAttribute,
    };

    fn update_with(nlri: &str, as_path: Vec<Asn>) -> UpdateMessage {
        UpdateMessage {
            withdrawn_routes: Vec::new(),
            path_attributes: vec![
                PathAttribute::Origin(Origin::Igp),
                PathAttribute::AsPath(AsPath::Sequence(as_path)),
                PathAttribute::NextHop(Ipv4Addr::new(192, 0, 2, 9)),
            ],
            nlri: vec![nlri.parse().unwrap()],
        }
    }

    #[tokio::test]
    async fn adj_in_records_every_nlri_under_one_shared_attribute_list() {
        let adj_in = AdjRibIn::new();
        let update = UpdateMessage {
            withdrawn_routes: Vec::new(),
            path_attributes: vec![PathAttribute::Origin(Origin::Igp)],
            nlri: vec!["10.0.0.0/8".parse().unwrap(), "172.16.0.0/12".parse().unwrap()],
        };
        assert!(adj_in.install_from_update(&update).await);
        let routes = adj_in.routes().await;
        assert_eq!(routes.len(), 2);
        assert!(routes[0].attributes.ptr_eq(&routes[1].attributes));
    }

    #[tokio::test]
    async fn loc_rib_rejects_routes_that_already_contain_its_own_as() {
        let installer = InMemoryRouteTable::default();
        let loc = LocRib::new(Asn(64512), Ipv4Addr::new(127, 0, 0, 1), &[], &InMemoryRouteTable::default()).await.unwrap();

        let adj_in = AdjRibIn::new();
        adj_in.install_from_update(&update_with("10.0.0.0/8", vec![Asn(64512)])).await;
        assert!(!loc.install_from_in(&adj_in, &installer).await.unwrap());
        assert!(loc.routes().await.is_empty());
        assert!(installer.installed_routes().is_empty());
    }

    #[tokio::test]
    async fn loc_rib_accepts_and_installs_a_route_without_its_own_as() {
        let installer = InMemoryRouteTable::default();
        let loc = LocRib::new(Asn(64512), Ipv4Addr::new(127, 0, 0, 1), &[], &InMemoryRouteTable::default()).await.unwrap();

        let adj_in = AdjRibIn::new();
        adj_in.install_from_update(&update_with("10.0.0.0/8", vec![Asn(64513)])).await;
        assert!(loc.install_from_in(&adj_in, &installer).await.unwrap());
        assert_eq!(loc.routes().await.len(), 1);
        assert_eq!(installer.installed_routes().len(), 1);
        assert!(loc.contains_new().await);
        loc.mark_all_unchanged().await;
        assert!(!loc.contains_new().await);
    }

    #[tokio::test]
    async fn adj_rib_out_rejects_routes_destined_to_loop_through_the_peer() {
        let loc = LocRib::new(Asn(64512), Ipv4Addr::new(127, 0, 0, 1), &[], &InMemoryRouteTable::default()).await.unwrap();
        let installer = InMemoryRouteTable::default();
        let adj_in = AdjRibIn::new();
        adj_in.install_from_update(&update_with("10.0.0.0/8", vec![Asn(64513)])).await;
        loc.install_from_in(&adj_in, &installer).await.unwrap();

        let out = AdjRibOut::new();
        assert!(!out.install_from_loc(&loc, Asn(64513)).await);
        assert!(out.routes_for_test().await.is_empty());
    }

    #[tokio::test]
    async fn originated_routes_prepend_local_as_on_advertisement() {
        let on_link = vec!["10.0.0.0/8".parse().unwrap()];
        let lookup = InMemoryRouteTable::new(on_link.clone());
        let loc = LocRib::new(Asn(64512), Ipv4Addr::new(127, 0, 0, 1), &on_link, &lookup).await.unwrap();

        let out = AdjRibOut::new();
        assert!(out.install_from_loc(&loc, Asn(64513)).await);

        let messages = out.to_update_messages(Ipv4Addr::new(198, 51, 100, 1), Asn(64512)).await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].path_attributes.contains(&PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64512)]))));
        assert!(messages[0].path_attributes.contains(&PathAttribute::NextHop(Ipv4Addr::new(198, 51, 100, 1))));
    }

    impl AdjRibOut {
        async fn routes_for_test(&self) -> Vec<RibEntry> {
            self.rib.routes().await
        }
    }
}
