// cluegrid_lobby — attribute-store side of the Cluegrid coordination stack.
//
// Everything that converges through the rendezvous service's key/value
// store lives here: the adapter boundary, the batched write engine, lobby
// membership, team/icon assignment with the forced-reassignment protocol,
// and the session-start transition.
//
// Module overview:
// - `store.rs`:         `AttributeStore`, the vendor adapter trait.
// - `sync.rs`:          `AttributeSyncEngine` — debounced atomic write
//                       batches out, typed event decode in.
// - `roster.rs`:        `LobbyMember`/`Roster` and derived icon pools.
// - `teams.rs`:         `TeamAssignmentCoordinator` — joins, forced moves,
//                       bulk pool moves, reconciliation.
// - `session_start.rs`: `SessionStartCoordinator` — descriptor publication
//                       and exactly-once start detection.
// - `events.rs`:        `LobbyEvent`, the typed signal replacement.
// - `context.rs`:       `Role`/`LobbyContext` — host-ness as a plain value.
// - `error.rs`:         `LobbyError` taxonomy; nothing fatal.
//
// Convergence model: attribute snapshots are full replaces delivered by
// change notification. Each coordinator decodes idempotently and compares
// against current state instead of trusting any delta ordering, because no
// ordering is guaranteed across separate write flushes.

pub mod context;
pub mod error;
pub mod events;
pub mod roster;
pub mod session_start;
pub mod store;
pub mod sync;
pub mod teams;

pub use context::{LobbyContext, Role};
pub use error::LobbyError;
pub use events::LobbyEvent;
pub use roster::{LobbyMember, Roster};
pub use session_start::SessionStartCoordinator;
pub use store::AttributeStore;
pub use sync::AttributeSyncEngine;
pub use teams::TeamAssignmentCoordinator;
