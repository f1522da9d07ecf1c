// Team assignment: self-service joins, host-forced moves, bulk pool moves,
// and collision-free icon allocation.
//
// The store has no cross-peer write privilege — a peer's `Team` and
// `ProfileIcon` attributes can only be written by that peer. Forced moves
// therefore converge indirectly: the host publishes a `ForceTeam_<peer>`
// (and for bulk moves a `ForceIcon_<peer>`) lobby attribute, the target
// notices the entry naming itself on a later snapshot and applies the
// assignment through the same `request_join` write path it uses for its own
// clicks, and the host removes the entry once it observes the target's
// reported state matching. In all-vs-all mode the entries are deliberately
// retained for the whole session so late joiners get bulk-redirected.
//
// Icon slots are allocated from a pool rebuilt off the live roster on every
// call. Bulk moves sidestep allocation races entirely: the host assigns
// slots sequentially from an empty pool in ascending peer-id order and
// publishes each target's slot, so no two peers ever allocate concurrently.

use std::collections::BTreeMap;
use std::time::Instant;

use cluegrid_protocol::attributes::{
    self, AttributeSnapshot, KEY_GAME_MODE, MEMBER_KEY_PROFILE_ICON, MEMBER_KEY_TEAM,
};
use cluegrid_protocol::types::{GameMode, IconSlot, PeerId, Team};
use tracing::{debug, warn};

use crate::context::LobbyContext;
use crate::error::LobbyError;
use crate::roster::Roster;
use crate::sync::AttributeSyncEngine;

/// Applies the team/icon assignment rules and the forced-reassignment
/// protocol.
pub struct TeamAssignmentCoordinator {
    /// Capacity of each playing team (`A`/`B`).
    team_capacity: u8,
    /// Current lobby mode, tracked from `ModeChanged` events.
    mode: GameMode,
    /// Host-local table of forced moves awaiting convergence.
    assignments: BTreeMap<PeerId, Team>,
}

impl TeamAssignmentCoordinator {
    pub fn new(team_capacity: u8) -> Self {
        Self {
            team_capacity,
            mode: GameMode::Teams,
            assignments: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Track the lobby mode (decoded from the `GameMode` attribute).
    pub fn set_mode(&mut self, mode: GameMode) {
        self.mode = mode;
    }

    /// Pending forced moves not yet observed as converged.
    pub fn pending_forces(&self) -> usize {
        self.assignments.len()
    }

    fn capacity_for(&self, team: Team) -> u8 {
        match team {
            Team::A | Team::B => self.team_capacity,
            // The shared pool holds the whole lobby; slots stay sequential.
            Team::Universal => u8::MAX,
            Team::None => 0,
        }
    }

    /// Self-service team join. Releases the previous icon slot, allocates
    /// the lowest free slot in the target team, and queues the two
    /// self-writes. No-op when the caller is already correctly assigned —
    /// required so repeated convergence passes do not cause write storms.
    pub fn request_join(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        team: Team,
        now: Instant,
    ) -> Result<(), LobbyError> {
        let member = roster.get(&ctx.self_id).ok_or(LobbyError::UnknownPeer {
            peer: ctx.self_id.clone(),
        })?;
        let (current_team, current_icon) = (member.team, member.icon);

        if current_team == team && self.icon_valid(roster, &ctx.self_id, team, current_icon) {
            return Ok(());
        }

        if team != Team::None && current_team != team {
            let occupied = roster.team_count(team);
            if occupied >= usize::from(self.capacity_for(team)) {
                return Err(LobbyError::TeamFull { team });
            }
        }

        // Rebuild the pool as seen with our old slot released: moving teams
        // frees the old slot implicitly (pools are per-team), and re-joining
        // the same team with an invalid icon re-allocates from live state.
        let icon = if team == Team::None {
            IconSlot::NONE
        } else {
            roster
                .lowest_free_icon(team, self.capacity_for(team))
                .ok_or(LobbyError::TeamFull { team })?
        };

        self.write_assignment(ctx, roster, engine, team, icon, now);
        Ok(())
    }

    /// Join with a host-published icon slot (forced reassignment). The slot
    /// was allocated deterministically by the host, so local allocation is
    /// skipped.
    pub fn join_with_icon(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        team: Team,
        icon: IconSlot,
        now: Instant,
    ) {
        let current = roster.get(&ctx.self_id).map(|m| (m.team, m.icon));
        if current == Some((team, icon)) {
            return;
        }
        self.write_assignment(ctx, roster, engine, team, icon, now);
    }

    fn write_assignment(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        team: Team,
        icon: IconSlot,
        now: Instant,
    ) {
        engine.queue_member_attribute(MEMBER_KEY_TEAM, team.as_attr(), now);
        engine.queue_member_attribute(MEMBER_KEY_PROFILE_ICON, &icon.as_attr(), now);
        roster.set_local_assignment(&ctx.self_id, team, icon);
        debug!(team = %team, icon = icon.0, "queued self assignment");
    }

    /// Whether `icon` is a settled, collision-free slot for `peer` on `team`.
    fn icon_valid(&self, roster: &Roster, peer: &PeerId, team: Team, icon: IconSlot) -> bool {
        if team == Team::None {
            return icon.is_none();
        }
        if icon.is_none() || icon.0 > self.capacity_for(team) {
            return false;
        }
        // No other member of the same team may hold the same slot.
        !roster
            .iter()
            .any(|m| m.peer != *peer && m.team == team && m.icon == icon)
    }

    /// Host-only: converge `target` onto `team`. A self-target behaves as
    /// `request_join`; remote targets go through the `ForceTeam_` protocol.
    pub fn force_move(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        target: &PeerId,
        team: Team,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        if target == &ctx.self_id {
            return self.request_join(ctx, roster, engine, team, now);
        }
        if !roster.contains(target) {
            return Err(LobbyError::UnknownPeer {
                peer: target.clone(),
            });
        }
        self.assignments.insert(target.clone(), team);
        engine.queue_attribute(ctx, &attributes::force_team_key(target), team.as_attr(), now)?;
        Ok(())
    }

    /// Apply a forced reassignment naming the local peer (decoded from a
    /// snapshot). Convergence goes through the normal join path; a forced
    /// icon overrides local allocation.
    pub fn apply_forced(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        team: Team,
        icon: Option<IconSlot>,
        now: Instant,
    ) {
        match icon {
            Some(slot) => self.join_with_icon(ctx, roster, engine, team, slot, now),
            None => {
                if let Err(err) = self.request_join(ctx, roster, engine, team, now) {
                    // A forced move into a full team can only happen if the
                    // host raced a capacity change; the next reconcile pass
                    // re-issues or clears the force entry.
                    warn!(%err, "forced reassignment not applied");
                }
            }
        }
    }

    /// Host-only: remove force entries whose targets now report the forced
    /// team. Retained wholesale in all-vs-all mode — late joiners must keep
    /// being redirected for the rest of the session.
    pub fn reconcile(
        &mut self,
        ctx: &LobbyContext,
        snapshot: &AttributeSnapshot,
        engine: &mut AttributeSyncEngine,
        now: Instant,
    ) {
        if !ctx.is_host() || self.mode == GameMode::AllVsAll {
            return;
        }
        let converged: Vec<PeerId> = self
            .assignments
            .iter()
            .filter(|(peer, forced)| snapshot.member_team(peer) == **forced)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in converged {
            self.assignments.remove(&peer);
            let _ = engine.queue_removal(ctx, &attributes::force_team_key(&peer), now);
            let _ = engine.queue_removal(ctx, &attributes::force_icon_key(&peer), now);
            debug!(%peer, "forced move converged, removed force entry");
        }
    }

    /// Host-only: move every member into the shared pool, persisting each
    /// member's previous team for a later restore. Icons are assigned
    /// sequentially from an empty pool in ascending peer-id order and
    /// published per target, so no allocation races are possible.
    pub fn move_all_to_pool(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        self.mode = GameMode::AllVsAll;
        engine.queue_attribute(ctx, KEY_GAME_MODE, GameMode::AllVsAll.as_attr(), now)?;

        let mut next_slot = 1u8;
        for peer in roster.peer_ids() {
            let previous = roster.get(&peer).map(|m| m.team).unwrap_or_default();
            engine.queue_attribute(
                ctx,
                &attributes::previous_team_key(&peer),
                previous.as_attr(),
                now,
            )?;
            let icon = IconSlot(next_slot);
            next_slot = next_slot.saturating_add(1);

            if peer == ctx.self_id {
                self.join_with_icon(ctx, roster, engine, Team::Universal, icon, now);
            } else {
                self.assignments.insert(peer.clone(), Team::Universal);
                engine.queue_attribute(
                    ctx,
                    &attributes::force_team_key(&peer),
                    Team::Universal.as_attr(),
                    now,
                )?;
                engine.queue_attribute(
                    ctx,
                    &attributes::force_icon_key(&peer),
                    &icon.as_attr(),
                    now,
                )?;
            }
        }
        Ok(())
    }

    /// Host-only: send everyone back to the team recorded under their
    /// `PreviousTeam_` attribute. Reads the snapshot, not host memory, so a
    /// restore works even after a host migration mid-mode.
    pub fn restore_from_pool(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        snapshot: &AttributeSnapshot,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        self.mode = GameMode::Teams;
        engine.queue_attribute(ctx, KEY_GAME_MODE, GameMode::Teams.as_attr(), now)?;

        // Per-team sequential slots from empty pools, ascending peer order.
        let mut next_slot: BTreeMap<Team, u8> = BTreeMap::new();
        for peer in roster.peer_ids() {
            let previous = snapshot
                .lobby_value(&attributes::previous_team_key(&peer))
                .map(Team::from_attr)
                .unwrap_or_default();
            let icon = if previous == Team::None {
                IconSlot::NONE
            } else {
                let slot = next_slot.entry(previous).or_insert(1);
                let icon = IconSlot(*slot);
                *slot = slot.saturating_add(1);
                icon
            };

            if peer == ctx.self_id {
                self.join_with_icon(ctx, roster, engine, previous, icon, now);
                self.assignments.remove(&peer);
            } else {
                self.assignments.insert(peer.clone(), previous);
                engine.queue_attribute(
                    ctx,
                    &attributes::force_team_key(&peer),
                    previous.as_attr(),
                    now,
                )?;
                engine.queue_attribute(
                    ctx,
                    &attributes::force_icon_key(&peer),
                    &icon.as_attr(),
                    now,
                )?;
            }
            let _ = engine.queue_removal(ctx, &attributes::previous_team_key(&peer), now);
        }
        Ok(())
    }

    /// Self-heal after racing allocations. Two peers that joined the same
    /// team inside one snapshot window can both have picked the same slot;
    /// on a later snapshot the one with the higher peer id re-allocates
    /// through the join path while the lower id keeps its slot, so exactly
    /// one side moves and the pair cannot oscillate. Also re-allocates a
    /// slot that is missing or above capacity. No-op in any settled state.
    pub fn heal_icon_collision(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        now: Instant,
    ) {
        let Some(me) = roster.get(&ctx.self_id) else {
            return;
        };
        let (team, icon) = (me.team, me.icon);
        if team == Team::None {
            return;
        }
        let collides_with_lower = !icon.is_none()
            && roster.iter().any(|m| {
                m.peer < ctx.self_id && m.team == team && m.icon == icon
            });
        let out_of_range = icon.is_none() || icon.0 > self.capacity_for(team);
        if collides_with_lower || out_of_range {
            debug!(%team, icon = icon.0, "re-allocating conflicting icon slot");
            if let Err(err) = self.request_join(ctx, roster, engine, team, now) {
                warn!(%err, "icon re-allocation failed");
            }
        }
    }

    /// Host-side handling of a join notification: in all-vs-all mode, late
    /// joiners are immediately redirected into the pool.
    pub fn on_member_joined(
        &mut self,
        ctx: &LobbyContext,
        roster: &mut Roster,
        engine: &mut AttributeSyncEngine,
        peer: &PeerId,
        now: Instant,
    ) {
        if ctx.is_host()
            && self.mode == GameMode::AllVsAll
            && peer != &ctx.self_id
            && let Err(err) = self.force_move(ctx, roster, engine, peer, Team::Universal, now)
        {
            warn!(%peer, %err, "failed to redirect late joiner into pool");
        }
    }

    /// Host-side handling of a leave/kick notification: drop the pending
    /// force entry and its published attributes.
    pub fn on_member_left(
        &mut self,
        ctx: &LobbyContext,
        engine: &mut AttributeSyncEngine,
        peer: &PeerId,
        now: Instant,
    ) {
        self.assignments.remove(peer);
        if ctx.is_host() {
            let _ = engine.queue_removal(ctx, &attributes::force_team_key(peer), now);
            let _ = engine.queue_removal(ctx, &attributes::force_icon_key(peer), now);
            let _ = engine.queue_removal(ctx, &attributes::previous_team_key(peer), now);
        }
    }

    /// Rebuild the host-local forced table from a snapshot — the new host's
    /// first duty after a migration, since no private state survived.
    pub fn rebuild_from_snapshot(&mut self, snapshot: &AttributeSnapshot) {
        self.assignments.clear();
        for (key, value) in &snapshot.lobby {
            if let Some(peer) = attributes::parse_force_team_key(key) {
                self.assignments.insert(peer, Team::from_attr(value));
            }
        }
        self.mode = snapshot
            .lobby_value(KEY_GAME_MODE)
            .map(GameMode::from_attr)
            .unwrap_or_default();
    }

    /// Drop all coordinator state (session teardown).
    pub fn clear(&mut self) {
        self.assignments.clear();
        self.mode = GameMode::Teams;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cluegrid_protocol::attributes::AttributeMap;

    use super::*;
    use crate::context::Role;

    const CAP: u8 = 5;

    struct Fixture {
        ctx: LobbyContext,
        roster: Roster,
        engine: AttributeSyncEngine,
        teams: TeamAssignmentCoordinator,
        now: Instant,
    }

    fn fixture(role: Role, peers: &[&str]) -> Fixture {
        let mut roster = Roster::new();
        for peer in peers {
            roster.insert(PeerId::from(*peer), format!("nick-{peer}"));
        }
        Fixture {
            ctx: LobbyContext::new(PeerId::from("self"), role),
            roster,
            engine: AttributeSyncEngine::new(Duration::from_millis(200)),
            teams: TeamAssignmentCoordinator::new(CAP),
            now: Instant::now(),
        }
    }

    #[test]
    fn join_allocates_lowest_free_icon() {
        let mut f = fixture(Role::Client, &["self", "a", "b"]);
        f.roster
            .set_local_assignment(&PeerId::from("a"), Team::A, IconSlot(1));
        f.roster
            .set_local_assignment(&PeerId::from("b"), Team::A, IconSlot(3));

        f.teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::A, f.now)
            .unwrap();

        let me = f.roster.get(&PeerId::from("self")).unwrap();
        assert_eq!(me.team, Team::A);
        assert_eq!(me.icon, IconSlot(2));
        assert!(f.engine.has_pending());
    }

    #[test]
    fn join_full_team_is_rejected_without_state_change() {
        let mut f = fixture(Role::Client, &["self", "a", "b", "c", "d", "e"]);
        for (i, peer) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            #[expect(clippy::cast_possible_truncation)]
            f.roster
                .set_local_assignment(&PeerId::from(*peer), Team::A, IconSlot(i as u8 + 1));
        }

        let result = f
            .teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::A, f.now);
        assert_eq!(result, Err(LobbyError::TeamFull { team: Team::A }));

        let me = f.roster.get(&PeerId::from("self")).unwrap();
        assert_eq!(me.team, Team::None);
        assert_eq!(me.icon, IconSlot::NONE);
        assert!(!f.engine.has_pending());
    }

    #[test]
    fn rejoin_same_team_with_valid_icon_is_noop() {
        let mut f = fixture(Role::Client, &["self"]);
        f.teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::A, f.now)
            .unwrap();
        let mut store_probe = AttributeSyncEngine::new(Duration::from_millis(200));
        std::mem::swap(&mut f.engine, &mut store_probe);

        // Second identical join must queue nothing.
        f.teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::A, f.now)
            .unwrap();
        assert!(!f.engine.has_pending());
    }

    #[test]
    fn join_none_releases_icon() {
        let mut f = fixture(Role::Client, &["self"]);
        f.teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::B, f.now)
            .unwrap();
        f.teams
            .request_join(&f.ctx, &mut f.roster, &mut f.engine, Team::None, f.now)
            .unwrap();

        let me = f.roster.get(&PeerId::from("self")).unwrap();
        assert_eq!(me.team, Team::None);
        assert_eq!(me.icon, IconSlot::NONE);
    }

    #[test]
    fn force_move_requires_host() {
        let mut f = fixture(Role::Client, &["self", "p"]);
        let result = f.teams.force_move(
            &f.ctx,
            &mut f.roster,
            &mut f.engine,
            &PeerId::from("p"),
            Team::B,
            f.now,
        );
        assert_eq!(result, Err(LobbyError::NotAuthorized));
    }

    #[test]
    fn force_move_records_assignment_and_publishes_key() {
        let mut f = fixture(Role::Host, &["self", "p"]);
        f.teams
            .force_move(
                &f.ctx,
                &mut f.roster,
                &mut f.engine,
                &PeerId::from("p"),
                Team::B,
                f.now,
            )
            .unwrap();
        assert_eq!(f.teams.pending_forces(), 1);
        assert!(f.engine.has_pending());
    }

    #[test]
    fn force_move_to_none_uses_empty_string() {
        let mut f = fixture(Role::Host, &["self", "p"]);
        f.teams
            .force_move(
                &f.ctx,
                &mut f.roster,
                &mut f.engine,
                &PeerId::from("p"),
                Team::None,
                f.now,
            )
            .unwrap();

        // Flush and inspect the published value: "" encodes explicit none.
        struct Capture(Vec<cluegrid_protocol::AttributeUpdate>);
        impl crate::store::AttributeStore for Capture {
            fn get_all(&self) -> AttributeSnapshot {
                AttributeSnapshot::default()
            }
            fn apply(&mut self, update: cluegrid_protocol::AttributeUpdate) {
                self.0.push(update);
            }
            fn set_joinable(&mut self, _joinable: bool) {}
        }
        let mut store = Capture(Vec::new());
        f.engine
            .flush_if_due(&mut store, f.now + Duration::from_secs(1));
        assert_eq!(
            store.0[0].set.get("ForceTeam_p").map(String::as_str),
            Some("")
        );
    }

    #[test]
    fn force_move_self_degrades_to_join() {
        let mut f = fixture(Role::Host, &["self"]);
        f.teams
            .force_move(
                &f.ctx,
                &mut f.roster,
                &mut f.engine,
                &PeerId::from("self"),
                Team::A,
                f.now,
            )
            .unwrap();
        assert_eq!(f.teams.pending_forces(), 0);
        assert_eq!(f.roster.get(&PeerId::from("self")).unwrap().team, Team::A);
    }

    fn snapshot_with_member(peer: &str, team: Team, icon: u8) -> AttributeSnapshot {
        let mut snapshot = AttributeSnapshot::default();
        let attrs: AttributeMap = [
            (MEMBER_KEY_TEAM.to_owned(), team.as_attr().to_owned()),
            (MEMBER_KEY_PROFILE_ICON.to_owned(), icon.to_string()),
        ]
        .into_iter()
        .collect();
        snapshot.members.insert(PeerId::from(peer), attrs);
        snapshot
    }

    #[test]
    fn reconcile_removes_converged_entries() {
        let mut f = fixture(Role::Host, &["self", "p"]);
        f.teams
            .force_move(
                &f.ctx,
                &mut f.roster,
                &mut f.engine,
                &PeerId::from("p"),
                Team::B,
                f.now,
            )
            .unwrap();

        // Not yet converged.
        let unconverged = snapshot_with_member("p", Team::A, 1);
        f.teams
            .reconcile(&f.ctx, &unconverged, &mut f.engine, f.now);
        assert_eq!(f.teams.pending_forces(), 1);

        // Converged: entry removed.
        let converged = snapshot_with_member("p", Team::B, 1);
        f.teams.reconcile(&f.ctx, &converged, &mut f.engine, f.now);
        assert_eq!(f.teams.pending_forces(), 0);
    }

    #[test]
    fn reconcile_retains_entries_in_all_vs_all() {
        let mut f = fixture(Role::Host, &["self", "p"]);
        f.teams
            .move_all_to_pool(&f.ctx, &mut f.roster, &mut f.engine, f.now)
            .unwrap();
        assert_eq!(f.teams.mode(), GameMode::AllVsAll);

        let converged = snapshot_with_member("p", Team::Universal, 2);
        f.teams.reconcile(&f.ctx, &converged, &mut f.engine, f.now);
        // Entry survives the whole session in this mode.
        assert_eq!(f.teams.pending_forces(), 1);
    }

    #[test]
    fn bulk_move_assigns_sequential_icons_in_peer_order() {
        let mut f = fixture(Role::Host, &["a", "b", "self"]);
        f.roster
            .set_local_assignment(&PeerId::from("a"), Team::A, IconSlot(2));
        f.roster
            .set_local_assignment(&PeerId::from("b"), Team::B, IconSlot(2));

        f.teams
            .move_all_to_pool(&f.ctx, &mut f.roster, &mut f.engine, f.now)
            .unwrap();

        struct Capture(Vec<cluegrid_protocol::AttributeUpdate>);
        impl crate::store::AttributeStore for Capture {
            fn get_all(&self) -> AttributeSnapshot {
                AttributeSnapshot::default()
            }
            fn apply(&mut self, update: cluegrid_protocol::AttributeUpdate) {
                self.0.push(update);
            }
            fn set_joinable(&mut self, _joinable: bool) {}
        }
        let mut store = Capture(Vec::new());
        f.engine
            .flush_if_due(&mut store, f.now + Duration::from_secs(1));
        let set = &store.0[0].set;

        // Ascending peer order: a → 1, b → 2, self → 3 (self-applied).
        assert_eq!(set.get("ForceIcon_a").map(String::as_str), Some("1"));
        assert_eq!(set.get("ForceIcon_b").map(String::as_str), Some("2"));
        assert_eq!(set.get("PreviousTeam_a").map(String::as_str), Some("A"));
        assert_eq!(set.get("PreviousTeam_b").map(String::as_str), Some("B"));
        assert_eq!(
            f.roster.get(&PeerId::from("self")).unwrap().icon,
            IconSlot(3)
        );
        assert_eq!(
            f.roster.get(&PeerId::from("self")).unwrap().team,
            Team::Universal
        );
    }

    #[test]
    fn restore_reads_previous_teams_from_snapshot() {
        let mut f = fixture(Role::Host, &["a", "b", "self"]);
        f.teams.set_mode(GameMode::AllVsAll);

        let mut snapshot = AttributeSnapshot::default();
        snapshot
            .lobby
            .insert("PreviousTeam_a".into(), "A".into());
        snapshot
            .lobby
            .insert("PreviousTeam_b".into(), "A".into());
        snapshot
            .lobby
            .insert("PreviousTeam_self".into(), "B".into());

        f.teams
            .restore_from_pool(&f.ctx, &mut f.roster, &mut f.engine, &snapshot, f.now)
            .unwrap();

        assert_eq!(f.teams.mode(), GameMode::Teams);
        // a and b both return to team A with fresh sequential slots.
        assert_eq!(f.teams.pending_forces(), 2);
        let me = f.roster.get(&PeerId::from("self")).unwrap();
        assert_eq!(me.team, Team::B);
        assert_eq!(me.icon, IconSlot(1));
    }

    #[test]
    fn late_joiner_redirected_in_all_vs_all() {
        let mut f = fixture(Role::Host, &["self"]);
        f.teams
            .move_all_to_pool(&f.ctx, &mut f.roster, &mut f.engine, f.now)
            .unwrap();

        f.roster.insert(PeerId::from("late"), "late".into());
        f.teams.on_member_joined(
            &f.ctx,
            &mut f.roster,
            &mut f.engine,
            &PeerId::from("late"),
            f.now,
        );
        assert!(f.teams.pending_forces() >= 1);
    }

    #[test]
    fn member_left_drops_force_entry() {
        let mut f = fixture(Role::Host, &["self", "p"]);
        f.teams
            .force_move(
                &f.ctx,
                &mut f.roster,
                &mut f.engine,
                &PeerId::from("p"),
                Team::B,
                f.now,
            )
            .unwrap();
        f.teams
            .on_member_left(&f.ctx, &mut f.engine, &PeerId::from("p"), f.now);
        assert_eq!(f.teams.pending_forces(), 0);
    }

    #[test]
    fn rebuild_from_snapshot_recovers_host_state() {
        let mut teams = TeamAssignmentCoordinator::new(CAP);
        let mut snapshot = AttributeSnapshot::default();
        snapshot.lobby.insert("ForceTeam_p".into(), "B".into());
        snapshot.lobby.insert("ForceTeam_q".into(), "".into());
        snapshot
            .lobby
            .insert(KEY_GAME_MODE.into(), "all_vs_all".into());

        teams.rebuild_from_snapshot(&snapshot);
        assert_eq!(teams.pending_forces(), 2);
        assert_eq!(teams.mode(), GameMode::AllVsAll);
    }
}
