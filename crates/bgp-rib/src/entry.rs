//! The attribute list and RIB entry shapes shared by all three RIBs.

use octavius_bgp_common::{
    Asn,
    Ipv4Prefix,
};
use octavius_bgp_wire::{
    AsPath,
    Origin,
    PathAttribute,
};
use std::{
    net::Ipv4Addr,
    sync::{
        Arc,
        Mutex,
    },
};

/// A path attribute list shared, by handle, across every entry that
/// advertises the same route under the same attributes - in particular
/// every NLRI carried in a single UPDATE message shares one `AttributeList`.
/// `to_update_messages` groups Adj-RIB-Out entries by this sharing
/// (`ptr_eq`) to re-emit one UPDATE per group, and rewrites each group's
/// contents in place rather than cloning it, so the rewrite is visible to
/// every entry in the group at once.
///
/// Interior mutability is a `std::sync::Mutex`, not a `tokio::sync::Mutex`:
/// every critical section here is a handful of `Vec` operations and never
/// crosses an `.await`.
#[derive(Clone, Debug)]
pub struct AttributeList(Arc<Mutex<Vec<PathAttribute>>>);

impl AttributeList {
    pub fn new(attributes: Vec<PathAttribute>) -> Self {
        Self(Arc::new(Mutex::new(attributes)))
    }

    pub fn snapshot(&self) -> Vec<PathAttribute> {
        self.0.lock().expect("attribute list mutex poisoned").clone()
    }

    /// Whether `self` and `other` are the very same shared list, not merely
    /// equal in content.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the *first* `AS_PATH` attribute in this list contains `asn`.
    /// Per the documented attribute-list contract, a list SHOULD carry at
    /// most one `AS_PATH`; if a malformed peer sends more than one, only the
    /// first is authoritative and the rest are ignored, mirroring
    /// `next_hop`'s `find_map` below.
    pub fn contains_as(&self, asn: Asn) -> bool {
        self.0
            .lock()
            .expect("attribute list mutex poisoned")
            .iter()
            .find_map(|attribute| match attribute {
                PathAttribute::AsPath(as_path) => Some(as_path.contains(asn)),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn next_hop(&self) -> Option<Ipv4Addr> {
        self.0.lock().expect("attribute list mutex poisoned").iter().find_map(|attribute| match attribute {
            PathAttribute::NextHop(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Rewrites this list in place for advertisement to a peer reached
    /// through `local_ip`: sets (or replaces) `NEXT_HOP` to `local_ip`, and
    /// - if an `AS_PATH` attribute is present - prepends `local_as` to the
    /// *first* one, leaving any further (malformed, duplicate) `AS_PATH`
    /// attributes untouched. Called once per outgoing UPDATE group; called
    /// again on a later Adj-RIB-Out recomputation it would prepend
    /// `local_as` a second time, a known limitation of the FSM's flag
    /// bookkeeping (see the design notes).
    pub fn rewrite_for_peer(&self, local_ip: Ipv4Addr, local_as: Asn) {
        let mut guard = self.0.lock().expect("attribute list mutex poisoned");
        let mut replaced_next_hop = false;
        let mut prepended_as_path = false;
        for attribute in guard.iter_mut() {
            match attribute {
                PathAttribute::NextHop(addr) => {
                    *addr = local_ip;
                    replaced_next_hop = true;
                }
                PathAttribute::AsPath(as_path) if !prepended_as_path => {
                    as_path.push(local_as);
                    prepended_as_path = true;
                }
                _ => {}
            }
        }
        if !replaced_next_hop {
            guard.push(PathAttribute::NextHop(local_ip));
        }
    }
}

/// The attributes a route originated by this speaker carries before any
/// peer-specific rewrite: `ORIGIN = IGP`, an empty `AS_PATH`, and `NEXT_HOP`
/// set to the speaker's own address.
pub fn originated_attributes(local_ip: Ipv4Addr) -> AttributeList {
    AttributeList::new(vec![
        PathAttribute::Origin(Origin::Igp),
        PathAttribute::AsPath(AsPath::empty_sequence()),
        PathAttribute::NextHop(local_ip),
    ])
}

/// One route advertisement: a prefix paired with the attributes it was
/// advertised under. Equality is by content (prefix and the current
/// attribute snapshot), not by the `AttributeList` handle - two entries can
/// be equal while sharing, or not sharing, the underlying attribute list.
#[derive(Clone, Debug)]
pub struct RibEntry {
    pub prefix: Ipv4Prefix,
    pub attributes: AttributeList,
}

impl RibEntry {
    pub fn new(prefix: Ipv4Prefix, attributes: AttributeList) -> Self {
        Self { prefix, attributes }
    }

    pub fn contains_as(&self, asn: Asn) -> bool {
        self.attributes.contains_as(asn)
    }
}

impl PartialEq for RibEntry {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.attributes.snapshot() == other.attributes.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_with_equal_content_are_equal_even_without_shared_handle() {
        let a = RibEntry::new("10.0.0.0/8".parse().unwrap(), originated_attributes(Ipv4Addr::new(127, 0, 0, 1)));
        let b = RibEntry::new("10.0.0.0/8".parse().unwrap(), originated_attributes(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(a, b);
        assert!(!a.attributes.ptr_eq(&b.attributes));
    }

    #[test]
    fn rewrite_for_peer_prepends_local_as_and_sets_next_hop() {
        let attributes = originated_attributes(Ipv4Addr::new(127, 0, 0, 1));
        attributes.rewrite_for_peer(Ipv4Addr::new(192, 0, 2, 1), Asn(64512));
        let snapshot = attributes.snapshot();
        assert!(snapshot.contains(&PathAttribute::NextHop(Ipv4Addr::new(192, 0, 2, 1))));
        assert!(snapshot.iter().any(|attribute| attribute.contains_as(Asn(64512))));
    }

    #[test]
    fn contains_as_and_rewrite_only_inspect_the_first_as_path() {
        // A malformed peer sending two AS_PATH attributes: only the second
        // carries AS 64513. `contains_as` must not see it, and a rewrite
        // must only ever touch the first AS_PATH.
        let attributes = AttributeList::new(vec![
            PathAttribute::Origin(Origin::Igp),
            PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64512)])),
            PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64513)])),
            PathAttribute::NextHop(Ipv4Addr::new(127, 0, 0, 1)),
        ]);

        assert!(attributes.contains_as(Asn(64512)));
        assert!(!attributes.contains_as(Asn(64513)));

        attributes.rewrite_for_peer(Ipv4Addr::new(192, 0, 2, 1), Asn(64514));
        let snapshot = attributes.snapshot();
        assert_eq!(snapshot[1], PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64512), Asn(64514)])));
        assert_eq!(snapshot[2], PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64513)])));
    }

    #[test]
    fn shared_handle_rewrite_is_visible_through_every_clone() {
        let attributes = originated_attributes(Ipv4Addr::new(127, 0, 0, 1));
        let shared = attributes.clone();
        attributes.rewrite_for_peer(Ipv4Addr::new(192, 0, 2, 1), Asn(64512));
        assert_eq!(attributes.snapshot(), shared.snapshot());
    }
}
