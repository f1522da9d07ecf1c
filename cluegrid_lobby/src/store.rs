// Adapter boundary for the rendezvous service's attribute store.
//
// The store is the vendor's: a per-lobby string→string map with change
// notifications and per-member sub-maps. This trait is the whole surface
// the coordination layer needs — reads are full snapshots (never deltas),
// writes are atomic batches assembled by the sync engine's debounce flush,
// and joinability is the host-settable gate used while the session
// descriptor is being published.
//
// Authorization is enforced above this boundary (the sync engine rejects
// non-host lobby writes); implementations just do I/O. Writes naming peers
// that have already vanished are applied as-is — the real service no-ops
// them, and the in-memory test store mirrors that.

use cluegrid_protocol::attributes::{AttributeSnapshot, AttributeUpdate};

/// The external key/value store, as seen by this layer.
pub trait AttributeStore {
    /// Read the full current state: lobby attributes plus every member's
    /// own attributes.
    fn get_all(&self) -> AttributeSnapshot;

    /// Apply one batch of writes atomically: lobby sets/removes (host) and
    /// the calling peer's own member-attribute sets.
    fn apply(&mut self, update: AttributeUpdate);

    /// Open or close the lobby to new joiners.
    fn set_joinable(&mut self, joinable: bool);
}
