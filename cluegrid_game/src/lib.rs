// cluegrid_game — the turn engine: host authority, client replication, and
// the deterministic board deal.
//
// Module overview:
// - `rng.rs`:         `DealRng`, the in-tree deterministic PRNG.
// - `board.rs`:       `Board::deal` — identical layout on every peer from
//                     the shared session seed; no board-exchange RPC.
// - `authority.rs`:   `GameTurnAuthority` — host-only confirm/skip/score
//                     machine emitting broadcast lists.
// - `client_view.rs`: `GameClientView` — verbatim, monotonic-safe
//                     broadcast application; the host renders through it
//                     too, and a promoted host adopts it as authority state.
// - `hints.rs`:       `HintSource` seam and the one-in-flight tracker.
// - `error.rs`:       `GameError`. Duplicate confirmations are not errors.

pub mod authority;
pub mod board;
pub mod client_view;
pub mod error;
pub mod hints;
pub mod rng;

pub use authority::{GamePhase, GameTurnAuthority};
pub use board::{Board, BoardComposition};
pub use client_view::GameClientView;
pub use error::GameError;
pub use hints::{HintRequest, HintResponse, HintSource, HintTracker};
pub use rng::DealRng;
