// Attribute sync engine: batched debounced writes out, typed events in.
//
// Outbound: `queue_attribute`/`queue_removal` (host-only) and
// `queue_member_attribute` (the peer's own member data) accumulate into one
// pending `AttributeUpdate`. The debounce window starts when the first
// change lands in an empty batch and is *not* restarted by later queues —
// writes arriving while the window is open simply join the batch. On expiry
// the whole batch goes to the store as one atomic update. There is no
// cancellation mid-window; teardown drops the batch via `clear`.
//
// Inbound: `ingest_snapshot` diff-decodes a full attribute snapshot into
// typed `LobbyEvent`s — member team/icon changes via the roster, lobby
// config changes against the previously seen values, and the
// forced-reassignment check for the local peer. Unknown keys are ignored.
// Snapshots are full replaces; decoding twice emits nothing the second
// time, and no ordering across separate flushes is assumed.

use std::time::{Duration, Instant};

use cluegrid_protocol::attributes::{
    self, AttributeMap, AttributeSnapshot, AttributeUpdate, KEY_AI_TYPE, KEY_CUSTOM_LOBBY_ID,
    KEY_GAME_MODE, KEY_GAME_SESSION_STATE, KEY_READY_TO_START,
};
use cluegrid_protocol::types::{GameMode, SessionState};
use tracing::warn;

use crate::context::LobbyContext;
use crate::error::LobbyError;
use crate::events::LobbyEvent;
use crate::roster::Roster;
use crate::store::AttributeStore;

/// Batches outgoing attribute writes and decodes incoming snapshots.
pub struct AttributeSyncEngine {
    debounce: Duration,
    pending: AttributeUpdate,
    flush_at: Option<Instant>,
    /// Lobby attributes as of the last ingested snapshot, for diff decode.
    last_lobby: AttributeMap,
}

impl AttributeSyncEngine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: AttributeUpdate::default(),
            flush_at: None,
            last_lobby: AttributeMap::new(),
        }
    }

    /// Queue a host-only lobby attribute write.
    pub fn queue_attribute(
        &mut self,
        ctx: &LobbyContext,
        key: &str,
        value: &str,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            warn!(key, "rejecting lobby attribute write from non-host");
            return Err(LobbyError::NotAuthorized);
        }
        // A removal queued earlier in this batch is superseded by the set.
        self.pending.remove.remove(key);
        self.pending.set.insert(key.to_owned(), value.to_owned());
        self.arm(now);
        Ok(())
    }

    /// Queue a host-only lobby attribute removal.
    pub fn queue_removal(
        &mut self,
        ctx: &LobbyContext,
        key: &str,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            warn!(key, "rejecting lobby attribute removal from non-host");
            return Err(LobbyError::NotAuthorized);
        }
        self.pending.set.remove(key);
        self.pending.remove.insert(key.to_owned());
        self.arm(now);
        Ok(())
    }

    /// Queue a write to one of the local peer's own member attributes.
    /// Self-writes are not host-gated — they are the single write path the
    /// forced-reassignment protocol converges through.
    pub fn queue_member_attribute(&mut self, key: &str, value: &str, now: Instant) {
        self.pending
            .member_set
            .insert(key.to_owned(), value.to_owned());
        self.arm(now);
    }

    fn arm(&mut self, now: Instant) {
        // Restart only when idle: an open window is never extended.
        if self.flush_at.is_none() {
            self.flush_at = Some(now + self.debounce);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When the current batch will flush, if one is armed.
    pub fn flush_due_at(&self) -> Option<Instant> {
        self.flush_at
    }

    /// Flush the batch if the debounce window has expired. Returns true if
    /// an update was applied to the store.
    pub fn flush_if_due(&mut self, store: &mut dyn AttributeStore, now: Instant) -> bool {
        match self.flush_at {
            Some(at) if now >= at => {
                let update = std::mem::take(&mut self.pending);
                self.flush_at = None;
                if update.is_empty() {
                    return false;
                }
                store.apply(update);
                true
            }
            _ => false,
        }
    }

    /// Drop all pending writes and the open window (session teardown).
    pub fn clear(&mut self) {
        self.pending = AttributeUpdate::default();
        self.flush_at = None;
        self.last_lobby.clear();
    }

    /// Decode a full snapshot into typed events. The roster is updated in
    /// place for member-attribute changes.
    pub fn ingest_snapshot(
        &mut self,
        ctx: &LobbyContext,
        snapshot: &AttributeSnapshot,
        roster: &mut Roster,
    ) -> Vec<LobbyEvent> {
        let mut events = roster.apply_snapshot(snapshot);

        self.diff_lobby_config(snapshot, &mut events);
        self.check_forced_reassignment(ctx, snapshot, roster, &mut events);

        self.last_lobby = snapshot.lobby.clone();
        events
    }

    fn diff_lobby_config(&self, snapshot: &AttributeSnapshot, events: &mut Vec<LobbyEvent>) {
        let old = |key: &str| self.last_lobby.get(key).map(String::as_str);
        let new = |key: &str| snapshot.lobby_value(key);

        let old_mode = old(KEY_GAME_MODE).map(GameMode::from_attr).unwrap_or_default();
        let new_mode = new(KEY_GAME_MODE).map(GameMode::from_attr).unwrap_or_default();
        if new_mode != old_mode {
            events.push(LobbyEvent::ModeChanged { mode: new_mode });
        }

        let old_ready = old(KEY_READY_TO_START).map(attributes::bool_from_attr);
        let new_ready = new(KEY_READY_TO_START).map(attributes::bool_from_attr);
        if new_ready != old_ready {
            events.push(LobbyEvent::ReadyChanged {
                ready: new_ready.unwrap_or(false),
            });
        }

        if let Some(value) = new(KEY_AI_TYPE)
            && old(KEY_AI_TYPE) != Some(value)
        {
            events.push(LobbyEvent::AiTypeChanged {
                value: value.to_owned(),
            });
        }

        if let Some(id) = new(KEY_CUSTOM_LOBBY_ID)
            && old(KEY_CUSTOM_LOBBY_ID) != Some(id)
        {
            events.push(LobbyEvent::LobbyIdChanged { id: id.to_owned() });
        }

        let old_state = old(KEY_GAME_SESSION_STATE)
            .map(SessionState::from_attr)
            .unwrap_or_default();
        let new_state = new(KEY_GAME_SESSION_STATE)
            .map(SessionState::from_attr)
            .unwrap_or_default();
        if new_state != old_state {
            events.push(LobbyEvent::SessionStateChanged { state: new_state });
        }
    }

    /// The forced-reassignment check runs on *every* snapshot, not just
    /// diffs: convergence is by comparison with current state, so repeated
    /// observation of the same force entry is harmless.
    fn check_forced_reassignment(
        &self,
        ctx: &LobbyContext,
        snapshot: &AttributeSnapshot,
        roster: &Roster,
        events: &mut Vec<LobbyEvent>,
    ) {
        let Some(forced_team) = snapshot.forced_team(&ctx.self_id) else {
            return;
        };
        let forced_icon = snapshot.forced_icon(&ctx.self_id);

        let (current_team, current_icon) = roster
            .get(&ctx.self_id)
            .map(|m| (m.team, m.icon))
            .unwrap_or_default();

        let team_differs = current_team != forced_team;
        let icon_differs = forced_icon.is_some_and(|slot| slot != current_icon);
        if team_differs || icon_differs {
            events.push(LobbyEvent::ForcedReassignment {
                team: forced_team,
                icon: forced_icon,
            });
        }
    }
}
