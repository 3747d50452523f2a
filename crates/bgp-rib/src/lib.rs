//! Three Routing Information Bases connected by propagation rules: routes
//! received from a peer flow from [`AdjRibIn`] into the speaker's shared
//! [`LocRib`], and from there into a per-peer [`AdjRibOut`] that the FSM
//! turns into outgoing UPDATEs.
//!
//! ## References
//! - [Routing Information Base, Section 3.2 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-3.2)

mod entry;
mod pipeline;

pub use entry::{
    AttributeList,
    RibEntry,
};
pub use pipeline::{
    AdjRibIn,
    AdjRibOut,
    LocRib,
};

/// Whether a RIB entry has been reprocessed by the stage downstream of it
/// yet. Every freshly inserted entry starts `New`; `mark_all_unchanged`
/// downgrades every entry to `Unchanged` in one atomic step, letting each
/// pipeline stage reprocess only what's new since it last looked.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Status {
    New,
    Unchanged,
}

/// A container of [`RibEntry`] values keyed by entry identity (the pair of
/// prefix and attribute-list content), not by prefix: two advertisements of
/// the same prefix with different attributes both persist side by side.
/// This speaker does not perform best-path replacement (RFC 4271 section
/// 9.1) - a documented simplification.
///
/// All mutating operations take the same internal lock for their whole
/// duration, so a caller composing several of them (as `LocRib` does around
/// the FIB install step) can hold that lock across the entire sequence by
/// using [`Rib::install_filtered`] instead of calling the primitives
/// separately.
pub(crate) struct Rib {
    entries: tokio::sync::Mutex<Vec<(RibEntry, Status)>>,
}

impl Rib {
    pub(crate) fn new() -> Self {
        Self { entries: tokio::sync::Mutex::new(Vec::new()) }
    }

    /// Snapshot of every entry currently in the RIB, regardless of status.
    pub(crate) async fn routes(&self) -> Vec<RibEntry> {
        self.entries.lock().await.iter().map(|(entry, _)| entry.clone()).collect()
    }

    pub(crate) async fn contains_new(&self) -> bool {
        self.entries.lock().await.iter().any(|(_, status)| *status == Status::New)
    }

    pub(crate) async fn mark_all_unchanged(&self) {
        for (_, status) in self.entries.lock().await.iter_mut() {
            *status = Status::Unchanged;
        }
    }

    /// Inserts `entry` with status `New` if no entry of equivalent identity
    /// (same prefix, same attribute content) is already present. A no-op
    /// otherwise. Returns whether the entry was newly inserted.
    pub(crate) async fn insert(&self, entry: RibEntry) -> bool {
        let mut guard = self.entries.lock().await;
        if guard.iter().any(|(existing, _)| *existing == entry) {
            return false;
        }
        guard.push((entry, Status::New));
        true
    }

    /// Inserts every candidate not rejected by `skip` and not already
    /// present, then - only if at least one was newly inserted - downgrades
    /// every entry to `Unchanged` in the same locked critical section.
    /// Returns whether anything new was inserted.
    pub(crate) async fn insert_filtered(&self, candidates: Vec<RibEntry>, skip: impl Fn(&RibEntry) -> bool) -> bool {
        let mut guard = self.entries.lock().await;
        let mut any_new = false;
        for candidate in candidates {
            if skip(&candidate) {
                continue;
            }
            if guard.iter().any(|(existing, _)| *existing == candidate) {
                continue;
            }
            guard.push((candidate, Status::New));
            any_new = true;
        }
        if any_new {
            for (_, status) in guard.iter_mut() {
                *status = Status::Unchanged;
            }
        }
        any_new
    }

    /// Like [`Rib::insert_filtered`], but additionally installs each newly
    /// inserted entry's route into the kernel FIB, via its attribute list's
    /// `NEXT_HOP`, while still holding the lock. This is the critical
    /// invariant from the speaker's concurrency model: `install ->
    /// contains_new -> write FIB -> mark_all_unchanged` must run under a
    /// single held lock so that concurrent peer tasks sharing this RIB can
    /// never observe a `New` flag that's already been consumed by another
    /// task. An entry with no `NEXT_HOP` attribute is installed nowhere and
    /// still inserted - malformed input we choose not to drop silently.
    pub(crate) async fn insert_filtered_with_fib<I: octavius_bgp_route::RoutingTableInstaller>(
        &self,
        candidates: Vec<RibEntry>,
        skip: impl Fn(&RibEntry) -> bool,
        installer: &I,
    ) -> Result<bool, octavius_bgp_route::RouteError> {
        let mut guard = self.entries.lock().await;
        let mut any_new = false;
        for candidate in candidates {
            if skip(&candidate) {
                continue;
            }
            if guard.iter().any(|(existing, _)| *existing == candidate) {
                continue;
            }
            if let Some(next_hop) = candidate.attributes.next_hop() {
                installer.install(candidate.prefix, next_hop).await?;
            }
            guard.push((candidate, Status::New));
            any_new = true;
        }
        if any_new {
            for (_, status) in guard.iter_mut() {
                *status = Status::Unchanged;
            }
        }
        Ok(any_new)
    }
}
