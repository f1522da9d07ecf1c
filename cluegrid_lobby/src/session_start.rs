// Session start: the host publishes a descriptor, every peer fires the
// lobby→game transition exactly once per session id.
//
// Publication order matters: the lobby is closed to new joiners *before*
// the descriptor writes are queued, so no peer can join mid-transition and
// observe a half-written descriptor. Detection is driven purely by snapshot
// decode — there is no separate "start" RPC — and is guarded per session id
// so the same descriptor observed in five consecutive snapshots fires once.
// The guard resets when the published state returns to `None`, which is how
// a rematch in the same lobby becomes startable again.

use std::time::Instant;

use cluegrid_protocol::attributes::{
    AttributeSnapshot, KEY_GAME_SESSION_STATE, SessionDescriptor,
};
use cluegrid_protocol::types::SessionState;
use tracing::{debug, info};

use crate::context::LobbyContext;
use crate::error::LobbyError;
use crate::store::AttributeStore;
use crate::sync::AttributeSyncEngine;

/// Publishes and detects the shared game-session descriptor.
#[derive(Default)]
pub struct SessionStartCoordinator {
    /// Session id whose `Starting` transition this peer has already fired.
    handled: Option<String>,
}

impl SessionStartCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-only: close the lobby and publish the descriptor. The close is
    /// immediate on the adapter; the four attribute writes flush as one
    /// batch on the next debounce expiry.
    pub fn publish_start(
        &mut self,
        ctx: &LobbyContext,
        engine: &mut AttributeSyncEngine,
        store: &mut dyn AttributeStore,
        session_id: &str,
        seed: u64,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        store.set_joinable(false);

        let descriptor = SessionDescriptor {
            session_id: session_id.to_owned(),
            seed,
            host: ctx.self_id.clone(),
            state: SessionState::Starting,
        };
        let mut batch = cluegrid_protocol::AttributeUpdate::default();
        descriptor.write_into(&mut batch);
        for (key, value) in &batch.set {
            engine.queue_attribute(ctx, key, value, now)?;
        }
        info!(session_id, seed, "published session start");
        Ok(())
    }

    /// Host-only: mark the published session as fully in-game (all peers
    /// detect the transition from `Starting`; `InGame` is informational for
    /// late observers).
    pub fn publish_in_game(
        &mut self,
        ctx: &LobbyContext,
        engine: &mut AttributeSyncEngine,
        now: Instant,
    ) -> Result<(), LobbyError> {
        engine.queue_attribute(
            ctx,
            KEY_GAME_SESSION_STATE,
            SessionState::InGame.as_attr(),
            now,
        )
    }

    /// Host-only: clear the session state for a rematch and reopen the
    /// lobby. Every peer's handled-guard resets when it observes `None`.
    pub fn publish_reset(
        &mut self,
        ctx: &LobbyContext,
        engine: &mut AttributeSyncEngine,
        store: &mut dyn AttributeStore,
        now: Instant,
    ) -> Result<(), LobbyError> {
        engine.queue_attribute(
            ctx,
            KEY_GAME_SESSION_STATE,
            SessionState::None.as_attr(),
            now,
        )?;
        store.set_joinable(true);
        Ok(())
    }

    /// Snapshot-decode trigger. Returns the descriptor exactly once per
    /// distinct session id whose state is `Starting`.
    pub fn observe(&mut self, snapshot: &AttributeSnapshot) -> Option<SessionDescriptor> {
        let state = snapshot
            .lobby_value(KEY_GAME_SESSION_STATE)
            .map(SessionState::from_attr)
            .unwrap_or_default();

        if state == SessionState::None {
            // Post-game reset (or descriptor never written): a future
            // session with any id may fire again.
            if self.handled.take().is_some() {
                debug!("session state returned to none, start guard reset");
            }
            return None;
        }

        let descriptor = SessionDescriptor::read(snapshot)?;
        if descriptor.state != SessionState::Starting {
            return None;
        }
        if self.handled.as_deref() == Some(descriptor.session_id.as_str()) {
            return None;
        }
        self.handled = Some(descriptor.session_id.clone());
        info!(session_id = %descriptor.session_id, "session start detected");
        Some(descriptor)
    }

    /// Drop the guard (session teardown).
    pub fn clear(&mut self) {
        self.handled = None;
    }
}
