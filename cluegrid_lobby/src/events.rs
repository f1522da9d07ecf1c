// Typed lobby events — the explicit replacement for engine-level signals.
//
// Coordinators return these from snapshot decodes and membership
// notifications; the session layer routes them to whoever subscribed
// (UI callbacks, the team coordinator's forced-move handler, the game
// stack's session-start transition). Every event is safe to re-deliver:
// decodes are idempotent, and consumers compare against current state
// rather than assuming a strict delta stream.

use cluegrid_protocol::attributes::SessionDescriptor;
use cluegrid_protocol::types::{GameMode, IconSlot, PeerId, SessionState, Team};

/// A decoded change in lobby state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A peer joined the lobby (membership notification).
    MemberJoined { peer: PeerId },
    /// A peer left or was kicked (membership notification).
    MemberLeft { peer: PeerId },
    /// A member's team or icon attribute changed.
    TeamChanged {
        peer: PeerId,
        team: Team,
        icon: IconSlot,
    },
    /// A member's nickname attribute changed.
    NicknameChanged { peer: PeerId, nickname: String },
    /// Host changed the lobby's game mode.
    ModeChanged { mode: GameMode },
    /// Host changed the AI/hint collaborator selection.
    AiTypeChanged { value: String },
    /// Host toggled the ready-to-start flag.
    ReadyChanged { ready: bool },
    /// Host published a custom lobby id.
    LobbyIdChanged { id: String },
    /// A `ForceTeam_` (and possibly `ForceIcon_`) entry names this peer and
    /// its current assignment differs — the peer must converge via its own
    /// self-write.
    ForcedReassignment {
        team: Team,
        icon: Option<IconSlot>,
    },
    /// The published session state changed.
    SessionStateChanged { state: SessionState },
    /// A complete session descriptor in `Starting` state was observed for
    /// the first time — fire the lobby→game transition exactly once.
    SessionStarted { descriptor: SessionDescriptor },
}
