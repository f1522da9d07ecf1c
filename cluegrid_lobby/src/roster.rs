// Lobby membership roster and the derived per-team icon pools.
//
// Members are created on the rendezvous join notification and removed on
// the leave/kick notification; their team/icon/nickname fields are then
// kept current from attribute snapshots. A `BTreeMap` keyed by `PeerId`
// gives deterministic iteration order, which the bulk-reassignment path
// relies on (icons assigned in ascending peer-id order must come out the
// same on every host).
//
// Icon pools are derived, never stored: every allocation rescans the
// current roster, so a stale cached pool can never hand out a duplicate
// slot after a snapshot moved someone.

use std::collections::BTreeMap;

use cluegrid_protocol::attributes::AttributeSnapshot;
use cluegrid_protocol::types::{IconSlot, PeerId, Team};

use crate::events::LobbyEvent;

/// One peer's lobby-visible state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyMember {
    pub peer: PeerId,
    pub nickname: String,
    pub team: Team,
    pub icon: IconSlot,
    pub in_lobby_view: bool,
}

impl LobbyMember {
    fn new(peer: PeerId, nickname: String) -> Self {
        Self {
            peer,
            nickname,
            team: Team::None,
            icon: IconSlot::NONE,
            in_lobby_view: true,
        }
    }
}

/// All current lobby members, keyed by peer id.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    members: BTreeMap<PeerId, LobbyMember>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member on the join notification. Returns false if the peer was
    /// already present (duplicate notification — ignored).
    pub fn insert(&mut self, peer: PeerId, nickname: String) -> bool {
        if self.members.contains_key(&peer) {
            return false;
        }
        self.members
            .insert(peer.clone(), LobbyMember::new(peer, nickname));
        true
    }

    /// Remove a member on the leave/kick notification.
    pub fn remove(&mut self, peer: &PeerId) -> Option<LobbyMember> {
        self.members.remove(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.members.contains_key(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&LobbyMember> {
        self.members.get(peer)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending peer-id order.
    pub fn iter(&self) -> impl Iterator<Item = &LobbyMember> {
        self.members.values()
    }

    /// Peer ids in ascending order (the canonical bulk-assignment order).
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.members.keys().cloned().collect()
    }

    pub fn team_count(&self, team: Team) -> usize {
        self.members.values().filter(|m| m.team == team).count()
    }

    /// The lowest free icon slot in `1..=capacity` for a team, scanning the
    /// live roster. `None` when every slot is taken.
    pub fn lowest_free_icon(&self, team: Team, capacity: u8) -> Option<IconSlot> {
        (1..=capacity)
            .map(IconSlot)
            .find(|slot| !self.icon_in_use(team, *slot))
    }

    fn icon_in_use(&self, team: Team, slot: IconSlot) -> bool {
        self.members
            .values()
            .any(|m| m.team == team && m.icon == slot)
    }

    /// Apply the local peer's own pending assignment immediately, without
    /// waiting for the store to echo it back in a snapshot. Keeps the no-op
    /// check in the join path accurate between snapshots.
    pub fn set_local_assignment(&mut self, peer: &PeerId, team: Team, icon: IconSlot) {
        if let Some(member) = self.members.get_mut(peer) {
            member.team = team;
            member.icon = icon;
        }
    }

    /// Fold a full attribute snapshot into the roster, returning one event
    /// per member whose team/icon or nickname actually changed. Members not
    /// yet announced by a join notification are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &AttributeSnapshot) -> Vec<LobbyEvent> {
        let mut events = Vec::new();
        for member in self.members.values_mut() {
            let team = snapshot.member_team(&member.peer);
            let icon = snapshot.member_icon(&member.peer);
            if team != member.team || icon != member.icon {
                member.team = team;
                member.icon = icon;
                events.push(LobbyEvent::TeamChanged {
                    peer: member.peer.clone(),
                    team,
                    icon,
                });
            }
            if let Some(nickname) = snapshot.member_nickname(&member.peer)
                && nickname != member.nickname
            {
                member.nickname = nickname.to_owned();
                events.push(LobbyEvent::NicknameChanged {
                    peer: member.peer.clone(),
                    nickname: member.nickname.clone(),
                });
            }
            member.in_lobby_view = snapshot.member_in_lobby_view(&member.peer);
        }
        events
    }

    /// Drop every member (session teardown).
    pub fn clear(&mut self) {
        self.members.clear();
    }
}
