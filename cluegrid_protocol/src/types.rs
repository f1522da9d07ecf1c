// Core identity and state types shared across the coordination stack.
//
// Everything here crosses a serialization boundary: peer-to-peer RPC
// payloads (JSON), lobby attribute values (plain strings), or both. Types
// that appear as attribute values carry explicit `as_attr`/`from_attr`
// codecs — the attribute store only speaks strings, and the encodings are
// part of the external interface, so they are spelled out here rather than
// left to serde's enum renaming.
//
// **Critical constraint: the empty string is a real value.** `Team::None`
// encodes as `""` so that "explicitly no team" is distinguishable from "key
// absent" in an attribute snapshot. `from_attr` therefore accepts `""`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque peer identifier assigned by the rendezvous service.
///
/// Stable for the lifetime of a session; never parsed or interpreted.
/// `Ord` matters: forced bulk reassignment iterates peers in ascending
/// `PeerId` order so every host derives the same icon sequence.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Index of a card on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card-{}", self.0)
    }
}

/// Monotonic turn-change counter, owned by the host.
///
/// Clients apply the broadcast value verbatim — they never increment it
/// themselves — so after convergence every peer holds the same counter even
/// if intermediate broadcasts were lost.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TurnCounter(pub u64);

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Team membership of a lobby member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Not on any team. Encodes as the empty string in attributes.
    #[default]
    None,
    A,
    B,
    /// The shared pool used by the all-vs-all mode.
    Universal,
}

impl Team {
    /// Attribute-store encoding. The empty string is `None` — see module docs.
    pub fn as_attr(self) -> &'static str {
        match self {
            Team::None => "",
            Team::A => "A",
            Team::B => "B",
            Team::Universal => "universal",
        }
    }

    /// Decode an attribute value. Unknown strings are `None` (not an error):
    /// a peer running a newer build must not wedge older peers.
    pub fn from_attr(value: &str) -> Team {
        match value {
            "A" => Team::A,
            "B" => Team::B,
            "universal" => Team::Universal,
            _ => Team::None,
        }
    }

    /// The opposing playing team. Only meaningful for `A` and `B`.
    pub fn opposing(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
            other => other,
        }
    }

    /// Whether this team takes turns in the card game.
    pub fn is_playing_team(self) -> bool {
        matches!(self, Team::A | Team::B)
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Team::None => "none",
            Team::A => "A",
            Team::B => "B",
            Team::Universal => "universal",
        };
        write!(f, "{label}")
    }
}

/// Per-team profile icon slot. `0` means no icon; valid slots are
/// `1..=team_capacity`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IconSlot(pub u8);

impl IconSlot {
    pub const NONE: IconSlot = IconSlot(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn as_attr(self) -> String {
        self.0.to_string()
    }

    /// Decode an attribute value; anything unparseable is slot 0.
    pub fn from_attr(value: &str) -> IconSlot {
        IconSlot(value.parse().unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// What a revealed card turns out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    TeamA,
    TeamB,
    Neutral,
    Assassin,
}

impl CardCategory {
    /// The team whose counter this card decrements, if any.
    pub fn scoring_team(self) -> Option<Team> {
        match self {
            CardCategory::TeamA => Some(Team::A),
            CardCategory::TeamB => Some(Team::B),
            CardCategory::Neutral | CardCategory::Assassin => None,
        }
    }

    pub fn is_assassin(self) -> bool {
        matches!(self, CardCategory::Assassin)
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of the shared game session, as published in the attribute store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session descriptor published (lobby phase, or post-game reset).
    #[default]
    None,
    /// Host has published the descriptor; peers are transitioning.
    Starting,
    /// All peers have acknowledged the transition.
    InGame,
}

impl SessionState {
    pub fn as_attr(self) -> &'static str {
        match self {
            SessionState::None => "none",
            SessionState::Starting => "starting",
            SessionState::InGame => "in_game",
        }
    }

    pub fn from_attr(value: &str) -> SessionState {
        match value {
            "starting" => SessionState::Starting,
            "in_game" => SessionState::InGame,
            _ => SessionState::None,
        }
    }
}

/// Lobby-wide game mode, host-set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Two fixed teams with per-team capacity.
    #[default]
    Teams,
    /// Everyone in the universal pool; force entries persist for the session.
    AllVsAll,
}

impl GameMode {
    pub fn as_attr(self) -> &'static str {
        match self {
            GameMode::Teams => "teams",
            GameMode::AllVsAll => "all_vs_all",
        }
    }

    pub fn from_attr(value: &str) -> GameMode {
        match value {
            "all_vs_all" => GameMode::AllVsAll,
            _ => GameMode::Teams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_attr_roundtrip() {
        for team in [Team::None, Team::A, Team::B, Team::Universal] {
            assert_eq!(Team::from_attr(team.as_attr()), team);
        }
    }

    #[test]
    fn team_none_is_empty_string() {
        // "Explicitly no team" must be writable as a value, distinct from
        // the key being absent.
        assert_eq!(Team::None.as_attr(), "");
        assert_eq!(Team::from_attr(""), Team::None);
    }

    #[test]
    fn unknown_team_decodes_as_none() {
        assert_eq!(Team::from_attr("C"), Team::None);
    }

    #[test]
    fn opposing_swaps_playing_teams_only() {
        assert_eq!(Team::A.opposing(), Team::B);
        assert_eq!(Team::B.opposing(), Team::A);
        assert_eq!(Team::Universal.opposing(), Team::Universal);
        assert_eq!(Team::None.opposing(), Team::None);
    }

    #[test]
    fn icon_slot_attr_roundtrip() {
        assert_eq!(IconSlot::from_attr(&IconSlot(3).as_attr()), IconSlot(3));
        assert_eq!(IconSlot::from_attr("garbage"), IconSlot::NONE);
    }

    #[test]
    fn session_state_attr_roundtrip() {
        for state in [SessionState::None, SessionState::Starting, SessionState::InGame] {
            assert_eq!(SessionState::from_attr(state.as_attr()), state);
        }
    }

    #[test]
    fn scoring_team_maps_categories() {
        assert_eq!(CardCategory::TeamA.scoring_team(), Some(Team::A));
        assert_eq!(CardCategory::TeamB.scoring_team(), Some(Team::B));
        assert_eq!(CardCategory::Neutral.scoring_team(), None);
        assert_eq!(CardCategory::Assassin.scoring_team(), None);
        assert!(CardCategory::Assassin.is_assassin());
    }
}
