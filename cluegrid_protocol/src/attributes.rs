// Attribute-store vocabulary: key names, per-peer key builders, snapshot and
// update containers, and the game-session descriptor codec.
//
// The rendezvous service's attribute store holds two namespaces:
// - lobby attributes, host-writable and visible to everyone
//   (`CustomLobbyId`, `GameMode`, `ForceTeam_<peer>`, the session
//   descriptor, ...);
// - per-member attributes, writable only by the member they describe
//   (`Nickname`, `Team`, `ProfileIcon`, `InLobbyView`).
//
// Both namespaces are plain string→string maps. All typed encodings live on
// the types themselves (`Team::as_attr`, ...); this module owns the key
// names and the multi-key session descriptor.
//
// Snapshots are always full replaces. A decode must never assume it is
// seeing a delta relative to the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{IconSlot, PeerId, SessionState, Team};

// Lobby attributes (host-writable).
pub const KEY_CUSTOM_LOBBY_ID: &str = "CustomLobbyId";
pub const KEY_GAME_MODE: &str = "GameMode";
pub const KEY_AI_TYPE: &str = "AIType";
pub const KEY_READY_TO_START: &str = "ReadyToStart";
pub const KEY_GAME_SESSION_ID: &str = "GameSessionId";
pub const KEY_GAME_SEED: &str = "GameSeed";
pub const KEY_GAME_HOST_ID: &str = "GameHostId";
pub const KEY_GAME_SESSION_STATE: &str = "GameSessionState";

// Per-peer lobby attribute prefixes (host-writable).
pub const FORCE_TEAM_PREFIX: &str = "ForceTeam_";
pub const FORCE_ICON_PREFIX: &str = "ForceIcon_";
pub const PREVIOUS_TEAM_PREFIX: &str = "PreviousTeam_";

// Member attributes (self-writable only).
pub const MEMBER_KEY_NICKNAME: &str = "Nickname";
pub const MEMBER_KEY_TEAM: &str = "Team";
pub const MEMBER_KEY_PROFILE_ICON: &str = "ProfileIcon";
pub const MEMBER_KEY_IN_LOBBY_VIEW: &str = "InLobbyView";

/// Bool encoding used by `ReadyToStart` and `InLobbyView`.
pub fn bool_as_attr(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

pub fn bool_from_attr(value: &str) -> bool {
    value == "true"
}

pub fn force_team_key(peer: &PeerId) -> String {
    format!("{FORCE_TEAM_PREFIX}{peer}")
}

pub fn force_icon_key(peer: &PeerId) -> String {
    format!("{FORCE_ICON_PREFIX}{peer}")
}

pub fn previous_team_key(peer: &PeerId) -> String {
    format!("{PREVIOUS_TEAM_PREFIX}{peer}")
}

pub fn parse_force_team_key(key: &str) -> Option<PeerId> {
    key.strip_prefix(FORCE_TEAM_PREFIX).map(PeerId::from)
}

pub fn parse_force_icon_key(key: &str) -> Option<PeerId> {
    key.strip_prefix(FORCE_ICON_PREFIX).map(PeerId::from)
}

pub fn parse_previous_team_key(key: &str) -> Option<PeerId> {
    key.strip_prefix(PREVIOUS_TEAM_PREFIX).map(PeerId::from)
}

/// String→string attribute map, ordered for deterministic iteration.
pub type AttributeMap = BTreeMap<String, String>;

/// A full read of the attribute store: lobby attributes plus every member's
/// own attributes, as delivered by the change notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeSnapshot {
    pub lobby: AttributeMap,
    pub members: BTreeMap<PeerId, AttributeMap>,
}

impl AttributeSnapshot {
    pub fn lobby_value(&self, key: &str) -> Option<&str> {
        self.lobby.get(key).map(String::as_str)
    }

    fn member_value(&self, peer: &PeerId, key: &str) -> Option<&str> {
        self.members.get(peer)?.get(key).map(String::as_str)
    }

    /// A member's current team; absent key decodes as `Team::None`.
    pub fn member_team(&self, peer: &PeerId) -> Team {
        self.member_value(peer, MEMBER_KEY_TEAM)
            .map(Team::from_attr)
            .unwrap_or_default()
    }

    /// A member's current icon slot; absent key decodes as slot 0.
    pub fn member_icon(&self, peer: &PeerId) -> IconSlot {
        self.member_value(peer, MEMBER_KEY_PROFILE_ICON)
            .map(IconSlot::from_attr)
            .unwrap_or_default()
    }

    pub fn member_nickname(&self, peer: &PeerId) -> Option<&str> {
        self.member_value(peer, MEMBER_KEY_NICKNAME)
    }

    pub fn member_in_lobby_view(&self, peer: &PeerId) -> bool {
        self.member_value(peer, MEMBER_KEY_IN_LOBBY_VIEW)
            .map(bool_from_attr)
            .unwrap_or(false)
    }

    /// The forced team for a peer, if a `ForceTeam_` entry names it.
    pub fn forced_team(&self, peer: &PeerId) -> Option<Team> {
        self.lobby_value(&force_team_key(peer)).map(Team::from_attr)
    }

    /// The forced icon for a peer, if a `ForceIcon_` entry names it.
    pub fn forced_icon(&self, peer: &PeerId) -> Option<IconSlot> {
        self.lobby_value(&force_icon_key(peer))
            .map(IconSlot::from_attr)
    }
}

/// One atomic batch of attribute writes, produced by the sync engine's
/// debounce flush and applied by the store adapter in a single update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeUpdate {
    /// Lobby attributes to set (host-only).
    pub set: AttributeMap,
    /// Lobby attributes to remove (host-only).
    pub remove: BTreeSet<String>,
    /// The writing peer's own member attributes to set.
    pub member_set: AttributeMap,
}

impl AttributeUpdate {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.member_set.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Game session descriptor
// ---------------------------------------------------------------------------

/// The four-attribute descriptor the host publishes to start a game.
///
/// Read succeeds only when all four keys are present — a peer must never act
/// on a half-written descriptor. The host writes all four in one batch, so
/// under the store's full-replace snapshot semantics a torn read cannot
/// happen; the guard covers foreign/legacy lobbies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub seed: u64,
    pub host: PeerId,
    pub state: SessionState,
}

impl SessionDescriptor {
    /// Decode the descriptor from a snapshot, requiring all four fields.
    pub fn read(snapshot: &AttributeSnapshot) -> Option<SessionDescriptor> {
        let session_id = snapshot.lobby_value(KEY_GAME_SESSION_ID)?.to_owned();
        let seed = snapshot.lobby_value(KEY_GAME_SEED)?.parse().ok()?;
        let host = PeerId::from(snapshot.lobby_value(KEY_GAME_HOST_ID)?);
        let state = SessionState::from_attr(snapshot.lobby_value(KEY_GAME_SESSION_STATE)?);
        Some(SessionDescriptor {
            session_id,
            seed,
            host,
            state,
        })
    }

    /// Queue the descriptor's four writes into an update batch.
    pub fn write_into(&self, update: &mut AttributeUpdate) {
        update
            .set
            .insert(KEY_GAME_SESSION_ID.into(), self.session_id.clone());
        update
            .set
            .insert(KEY_GAME_SEED.into(), self.seed.to_string());
        update
            .set
            .insert(KEY_GAME_HOST_ID.into(), self.host.to_string());
        update
            .set
            .insert(KEY_GAME_SESSION_STATE.into(), self.state.as_attr().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(lobby: &[(&str, &str)]) -> AttributeSnapshot {
        AttributeSnapshot {
            lobby: lobby
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            members: BTreeMap::new(),
        }
    }

    #[test]
    fn force_key_roundtrip() {
        let peer = PeerId::from("peer-42");
        assert_eq!(force_team_key(&peer), "ForceTeam_peer-42");
        assert_eq!(parse_force_team_key("ForceTeam_peer-42"), Some(peer.clone()));
        assert_eq!(parse_force_icon_key(&force_icon_key(&peer)), Some(peer.clone()));
        assert_eq!(
            parse_previous_team_key(&previous_team_key(&peer)),
            Some(peer)
        );
        assert_eq!(parse_force_team_key("GameMode"), None);
    }

    #[test]
    fn descriptor_requires_all_four_fields() {
        let full = snapshot_with(&[
            (KEY_GAME_SESSION_ID, "s-1"),
            (KEY_GAME_SEED, "99"),
            (KEY_GAME_HOST_ID, "host-peer"),
            (KEY_GAME_SESSION_STATE, "starting"),
        ]);
        let descriptor = SessionDescriptor::read(&full).unwrap();
        assert_eq!(descriptor.session_id, "s-1");
        assert_eq!(descriptor.seed, 99);
        assert_eq!(descriptor.host, PeerId::from("host-peer"));
        assert_eq!(descriptor.state, SessionState::Starting);

        for missing in [
            KEY_GAME_SESSION_ID,
            KEY_GAME_SEED,
            KEY_GAME_HOST_ID,
            KEY_GAME_SESSION_STATE,
        ] {
            let mut partial = full.clone();
            partial.lobby.remove(missing);
            assert!(
                SessionDescriptor::read(&partial).is_none(),
                "descriptor should not decode without {missing}"
            );
        }
    }

    #[test]
    fn descriptor_rejects_unparseable_seed() {
        let snapshot = snapshot_with(&[
            (KEY_GAME_SESSION_ID, "s-1"),
            (KEY_GAME_SEED, "not-a-number"),
            (KEY_GAME_HOST_ID, "host-peer"),
            (KEY_GAME_SESSION_STATE, "starting"),
        ]);
        assert!(SessionDescriptor::read(&snapshot).is_none());
    }

    #[test]
    fn descriptor_write_read_roundtrip() {
        let descriptor = SessionDescriptor {
            session_id: "game-7".into(),
            seed: 0xDEAD_BEEF,
            host: PeerId::from("h"),
            state: SessionState::Starting,
        };
        let mut update = AttributeUpdate::default();
        descriptor.write_into(&mut update);
        assert_eq!(update.set.len(), 4);

        let snapshot = AttributeSnapshot {
            lobby: update.set,
            members: BTreeMap::new(),
        };
        assert_eq!(SessionDescriptor::read(&snapshot), Some(descriptor));
    }

    #[test]
    fn member_lookups_default_when_absent() {
        let snapshot = AttributeSnapshot::default();
        let peer = PeerId::from("ghost");
        assert_eq!(snapshot.member_team(&peer), Team::None);
        assert_eq!(snapshot.member_icon(&peer), IconSlot::NONE);
        assert_eq!(snapshot.member_nickname(&peer), None);
        assert!(!snapshot.member_in_lobby_view(&peer));
    }

    #[test]
    fn forced_lookups() {
        let peer = PeerId::from("p");
        let snapshot = snapshot_with(&[("ForceTeam_p", "B"), ("ForceIcon_p", "4")]);
        assert_eq!(snapshot.forced_team(&peer), Some(Team::B));
        assert_eq!(snapshot.forced_icon(&peer), Some(IconSlot(4)));
        assert_eq!(snapshot.forced_team(&PeerId::from("q")), None);
    }

    #[test]
    fn forced_team_empty_string_is_explicit_none() {
        let peer = PeerId::from("p");
        let snapshot = snapshot_with(&[("ForceTeam_p", "")]);
        // Present-but-empty means "forced to no team", not "unset".
        assert_eq!(snapshot.forced_team(&peer), Some(Team::None));
    }
}
