// Lobby-layer error taxonomy.
//
// Everything here degrades to "retry" or "ignore" at the call site — the
// rendezvous substrate has no transaction primitive, so there is nothing a
// fatal error could protect.

use cluegrid_protocol::types::{PeerId, Team};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    /// A non-host peer attempted a host-only write. Logged and rejected
    /// with no state change.
    #[error("not authorized: host-only operation attempted by a client")]
    NotAuthorized,

    /// The target team is at capacity. Surfaced to the caller; the
    /// requester's attributes are left untouched.
    #[error("team {team} is full")]
    TeamFull { team: Team },

    /// An operation named a peer that is not in the roster.
    #[error("unknown peer {peer}")]
    UnknownPeer { peer: PeerId },
}
