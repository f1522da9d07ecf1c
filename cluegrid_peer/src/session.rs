// PeerSession: the application-facing coordination stack for one peer.
//
// Wires the protocol, net, lobby, and game layers behind the programmatic
// entry points the host application calls (`start_as_host`,
// `start_as_client`, `request_join`, `confirm_card`, `skip_turn`, ...).
// Everything is driven cooperatively:
//
// - `tick(now, ...)` — once per main-loop tick: drain the packet relay,
//   step the handshake retry timers, flush the attribute debounce window,
//   poll the hint collaborator. Never blocks.
// - `on_attributes_changed(...)` — when the rendezvous service delivers a
//   change notification: ingest the full snapshot, route decoded events to
//   the coordinators, detect session start, reconcile forced moves.
// - `on_member_joined` / `on_member_left` / `on_host_changed` — membership
//   and promotion notifications from the rendezvous service.
//
// The adapters (`AttributeStore`, `PacketRelay`, `HintSource`) stay owned
// by the caller and are passed in per call — the session owns no I/O and
// reads no clock, so the whole stack runs deterministically under the
// integration harness.
//
// Host-ness is a value (`Role`), not a type: promotion swaps the role and
// re-derives host-local state from the current snapshot plus the already-
// replicated client view. No private in-memory state survives a handoff.

use std::time::Instant;

use cluegrid_game::{GameClientView, GameError, GameTurnAuthority, HintSource, HintTracker};
use cluegrid_lobby::{
    AttributeStore, AttributeSyncEngine, LobbyContext, LobbyError, LobbyEvent, Role, Roster,
    SessionStartCoordinator, TeamAssignmentCoordinator,
};
use cluegrid_net::{
    ClientHandshake, HostHandshake, InboundEvent, PacketPump, PacketRelay, broadcast_rpc, send_rpc,
};
use cluegrid_protocol::attributes::{
    KEY_AI_TYPE, KEY_CUSTOM_LOBBY_ID, KEY_READY_TO_START, MEMBER_KEY_IN_LOBBY_VIEW,
    MEMBER_KEY_NICKNAME, SessionDescriptor, bool_as_attr,
};
use cluegrid_protocol::message::GameMessage;
use cluegrid_protocol::types::{CardId, PeerId, SessionState, Team};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;

/// Logical channel name for a session id. Scoping traffic by session keeps
/// stale packets from a previous game on the same transport filterable.
fn channel_name(session_id: &str) -> String {
    format!("cluegrid/{session_id}")
}

/// One peer's full coordination stack.
pub struct PeerSession {
    config: CoordinatorConfig,
    ctx: LobbyContext,
    session_id: String,
    channel: String,
    host: PeerId,

    engine: AttributeSyncEngine,
    roster: Roster,
    teams: TeamAssignmentCoordinator,
    session_start: SessionStartCoordinator,

    pump: PacketPump,
    client_handshake: Option<ClientHandshake>,
    host_handshake: Option<HostHandshake>,

    authority: GameTurnAuthority,
    view: GameClientView,
    hint_tracker: HintTracker,

    /// Descriptor of the running game, kept for host-migration re-derive.
    descriptor: Option<SessionDescriptor>,
    /// Last `test_ack` nonce received, for harness verification.
    last_test_ack: Option<(PeerId, u64)>,
}

impl PeerSession {
    /// Start as the lobby host. `known_peers` are members already present
    /// at startup; later arrivals come via `on_member_joined`.
    pub fn start_as_host(
        config: CoordinatorConfig,
        session_id: &str,
        self_id: PeerId,
        nickname: &str,
        known_peers: &[PeerId],
        store: &mut dyn AttributeStore,
        now: Instant,
    ) -> Self {
        let channel = channel_name(session_id);
        let mut session = Self::new_common(
            config,
            session_id,
            self_id.clone(),
            nickname,
            self_id,
            now,
        );
        session.host_handshake = Some(HostHandshake::new(
            &channel,
            session_id,
            session.config.welcome_min_spacing(),
        ));
        for peer in known_peers {
            session.roster.insert(peer.clone(), peer.to_string());
        }
        store.set_joinable(true);
        info!(session_id, "started as host");
        session
    }

    /// Start as a client of `host_id`. The handshake begins retrying on the
    /// first tick, regardless of whether the host is listening yet.
    pub fn start_as_client(
        config: CoordinatorConfig,
        session_id: &str,
        self_id: PeerId,
        nickname: &str,
        host_id: PeerId,
        now: Instant,
    ) -> Self {
        let channel = channel_name(session_id);
        let retry = config.hello_retry();
        let mut session = Self::new_common(config, session_id, self_id.clone(), nickname, host_id.clone(), now);
        session.ctx.role = Role::Client;
        session.client_handshake = Some(ClientHandshake::new(
            &channel, session_id, self_id, host_id, retry,
        ));
        info!(session_id, "started as client");
        session
    }

    fn new_common(
        config: CoordinatorConfig,
        session_id: &str,
        self_id: PeerId,
        nickname: &str,
        host: PeerId,
        now: Instant,
    ) -> Self {
        let channel = channel_name(session_id);
        let mut engine = AttributeSyncEngine::new(config.write_debounce());
        engine.queue_member_attribute(MEMBER_KEY_NICKNAME, nickname, now);
        engine.queue_member_attribute(MEMBER_KEY_IN_LOBBY_VIEW, bool_as_attr(true), now);

        let mut roster = Roster::new();
        roster.insert(self_id.clone(), nickname.to_owned());

        let team_capacity = config.team_capacity;
        Self {
            config,
            ctx: LobbyContext::new(self_id, Role::Host),
            session_id: session_id.to_owned(),
            channel: channel.clone(),
            host,
            engine,
            roster,
            teams: TeamAssignmentCoordinator::new(team_capacity),
            session_start: SessionStartCoordinator::new(),
            pump: PacketPump::new(&channel),
            client_handshake: None,
            host_handshake: None,
            authority: GameTurnAuthority::new(),
            view: GameClientView::new(),
            hint_tracker: HintTracker::new(),
            descriptor: None,
            last_test_ack: None,
        }
    }

    // -----------------------------------------------------------------------
    // Driving callbacks
    // -----------------------------------------------------------------------

    /// One cooperative tick: drain the relay, step handshake timers, flush
    /// the attribute batch, poll the hint collaborator.
    pub fn tick(
        &mut self,
        store: &mut dyn AttributeStore,
        relay: &mut dyn PacketRelay,
        hint_source: &mut dyn HintSource,
        now: Instant,
    ) {
        for event in self.pump.drain(relay) {
            match event {
                InboundEvent::Hello { from } => {
                    if let Some(handshake) = &mut self.host_handshake {
                        handshake.on_hello(relay, &from, now);
                    } else {
                        debug!(%from, "ignoring hello (not hosting)");
                    }
                }
                InboundEvent::Welcome { from, session_id } => {
                    if let Some(handshake) = &mut self.client_handshake {
                        handshake.on_welcome(&from, &session_id);
                    }
                }
                InboundEvent::Rpc { from, message } => {
                    self.on_rpc(relay, from, message);
                }
            }
        }

        if let Some(handshake) = &mut self.client_handshake {
            handshake.tick(relay, now);
        }

        self.engine.flush_if_due(store, now);

        if let Some(response) = hint_source.poll() {
            if self.ctx.is_host() {
                if let Some((team, hint)) = self.hint_tracker.accept(response) {
                    self.broadcast_and_apply(relay, vec![GameMessage::HintGiven { team, hint }]);
                }
            } else {
                debug!("dropping hint result on non-host");
            }
        }
    }

    /// Rendezvous change notification: ingest the full snapshot and route
    /// the decoded events. Returns the events for UI-level subscribers.
    pub fn on_attributes_changed(
        &mut self,
        store: &mut dyn AttributeStore,
        relay: &mut dyn PacketRelay,
        now: Instant,
    ) -> Vec<LobbyEvent> {
        let snapshot = store.get_all();
        let mut events = self
            .engine
            .ingest_snapshot(&self.ctx, &snapshot, &mut self.roster);

        for event in events.clone() {
            match event {
                LobbyEvent::ModeChanged { mode } => self.teams.set_mode(mode),
                LobbyEvent::ForcedReassignment { team, icon } => {
                    self.teams.apply_forced(
                        &self.ctx,
                        &mut self.roster,
                        &mut self.engine,
                        team,
                        icon,
                        now,
                    );
                }
                LobbyEvent::SessionStateChanged {
                    state: SessionState::None,
                } => {
                    // Post-game reset observed: back to lobby state.
                    self.authority.clear();
                    self.view.clear();
                    self.hint_tracker.clear();
                    self.descriptor = None;
                }
                _ => {}
            }
        }

        if let Some(descriptor) = self.session_start.observe(&snapshot) {
            self.view.start_session();
            if self.ctx.is_host() {
                let broadcasts = self
                    .authority
                    .start_game(descriptor.seed, &self.config.board);
                self.broadcast_and_apply(relay, broadcasts);
                let _ = self.session_start.publish_in_game(&self.ctx, &mut self.engine, now);
            }
            self.descriptor = Some(descriptor.clone());
            events.push(LobbyEvent::SessionStarted { descriptor });
        }

        // A pending force entry owns this peer's assignment; otherwise,
        // resolve any icon race the last snapshot window produced.
        if snapshot.forced_team(&self.ctx.self_id).is_none() {
            self.teams
                .heal_icon_collision(&self.ctx, &mut self.roster, &mut self.engine, now);
        }

        self.teams
            .reconcile(&self.ctx, &snapshot, &mut self.engine, now);

        events
    }

    /// Membership notification: a peer joined the lobby.
    pub fn on_member_joined(
        &mut self,
        peer: PeerId,
        nickname: &str,
        now: Instant,
    ) -> Vec<LobbyEvent> {
        if !self.roster.insert(peer.clone(), nickname.to_owned()) {
            return Vec::new();
        }
        self.teams
            .on_member_joined(&self.ctx, &mut self.roster, &mut self.engine, &peer, now);
        vec![LobbyEvent::MemberJoined { peer }]
    }

    /// Membership notification: a peer left or was kicked.
    pub fn on_member_left(&mut self, peer: &PeerId, now: Instant) -> Vec<LobbyEvent> {
        if self.roster.remove(peer).is_none() {
            return Vec::new();
        }
        self.teams
            .on_member_left(&self.ctx, &mut self.engine, peer, now);
        if let Some(handshake) = &mut self.host_handshake {
            handshake.remove_peer(peer);
        }
        vec![LobbyEvent::MemberLeft { peer: peer.clone() }]
    }

    /// The rendezvous service promoted a new host. If it is this peer, take
    /// over: host-local state is re-derived from the snapshot and the
    /// already-replicated client view — nothing private survived the old
    /// host.
    pub fn on_host_changed(&mut self, new_host: PeerId, store: &mut dyn AttributeStore) {
        self.host = new_host.clone();
        if new_host == self.ctx.self_id {
            self.ctx.role = Role::Host;
            self.client_handshake = None;
            self.host_handshake = Some(HostHandshake::new(
                &self.channel,
                &self.session_id,
                self.config.welcome_min_spacing(),
            ));
            let snapshot = store.get_all();
            self.teams.rebuild_from_snapshot(&snapshot);
            if let Some(descriptor) = SessionDescriptor::read(&snapshot)
                && descriptor.state != SessionState::None
            {
                self.authority
                    .adopt_from_view(descriptor.seed, &self.config.board, &self.view);
                self.descriptor = Some(descriptor);
            }
            info!("promoted to host");
        } else {
            self.ctx.role = Role::Client;
            self.host_handshake = None;
            self.authority.clear();
            self.client_handshake = Some(ClientHandshake::new(
                &self.channel,
                &self.session_id,
                self.ctx.self_id.clone(),
                new_host,
                self.config.hello_retry(),
            ));
            info!(host = %self.host, "following new host");
        }
    }

    /// Leave the lobby (or react to being kicked): synchronously clear all
    /// coordinator state before any further tick can process notifications
    /// for a session this peer no longer belongs to.
    pub fn leave(&mut self) {
        if let Some(handshake) = &mut self.client_handshake {
            handshake.cancel();
        }
        self.client_handshake = None;
        if let Some(handshake) = &mut self.host_handshake {
            handshake.clear();
        }
        self.host_handshake = None;
        self.engine.clear();
        self.roster.clear();
        self.teams.clear();
        self.session_start.clear();
        self.authority.clear();
        self.view.clear();
        self.hint_tracker.clear();
        self.descriptor = None;
        info!("left session, coordinator state cleared");
    }

    // -----------------------------------------------------------------------
    // Lobby entry points
    // -----------------------------------------------------------------------

    /// Join a team (self-service single write path).
    pub fn request_join(&mut self, team: Team, now: Instant) -> Result<(), LobbyError> {
        self.teams
            .request_join(&self.ctx, &mut self.roster, &mut self.engine, team, now)
    }

    /// Host-only: converge another peer onto a team.
    pub fn force_move(
        &mut self,
        target: &PeerId,
        team: Team,
        now: Instant,
    ) -> Result<(), LobbyError> {
        self.teams
            .force_move(&self.ctx, &mut self.roster, &mut self.engine, target, team, now)
    }

    /// Host-only: move everyone into the shared pool (all-vs-all).
    pub fn move_all_to_pool(&mut self, now: Instant) -> Result<(), LobbyError> {
        self.teams
            .move_all_to_pool(&self.ctx, &mut self.roster, &mut self.engine, now)
    }

    /// Host-only: restore everyone to their recorded previous team.
    pub fn restore_from_pool(
        &mut self,
        store: &mut dyn AttributeStore,
        now: Instant,
    ) -> Result<(), LobbyError> {
        let snapshot = store.get_all();
        self.teams.restore_from_pool(
            &self.ctx,
            &mut self.roster,
            &mut self.engine,
            &snapshot,
            now,
        )
    }

    /// Host-only: publish the ready-to-start flag.
    pub fn set_ready_to_start(&mut self, ready: bool, now: Instant) -> Result<(), LobbyError> {
        self.engine
            .queue_attribute(&self.ctx, KEY_READY_TO_START, bool_as_attr(ready), now)
    }

    /// Host-only: publish the hint collaborator selection.
    pub fn set_ai_type(&mut self, value: &str, now: Instant) -> Result<(), LobbyError> {
        self.engine
            .queue_attribute(&self.ctx, KEY_AI_TYPE, value, now)
    }

    /// Host-only: publish a human-friendly lobby id.
    pub fn set_custom_lobby_id(&mut self, id: &str, now: Instant) -> Result<(), LobbyError> {
        self.engine
            .queue_attribute(&self.ctx, KEY_CUSTOM_LOBBY_ID, id, now)
    }

    /// Host-only: generate a session id and seed, close the lobby, publish
    /// the descriptor. Every peer (this one included) transitions when the
    /// descriptor comes back in a snapshot. Returns the generated id.
    pub fn start_game(
        &mut self,
        store: &mut dyn AttributeStore,
        now: Instant,
    ) -> Result<String, LobbyError> {
        let session_id = generate_game_id();
        let seed: u64 = rand::rng().random();
        self.session_start.publish_start(
            &self.ctx,
            &mut self.engine,
            store,
            &session_id,
            seed,
            now,
        )?;
        Ok(session_id)
    }

    /// Host-only: clear the session state for a rematch and reopen the
    /// lobby. Peers reset their start guards when the `None` state lands.
    pub fn reset_game(
        &mut self,
        store: &mut dyn AttributeStore,
        now: Instant,
    ) -> Result<(), LobbyError> {
        if !self.ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        self.session_start
            .publish_reset(&self.ctx, &mut self.engine, store, now)
    }

    // -----------------------------------------------------------------------
    // Game entry points
    // -----------------------------------------------------------------------

    /// Point at a card (UI echo; no authority involved).
    pub fn select_card(&mut self, relay: &mut dyn PacketRelay, card: CardId) {
        let message = GameMessage::CardSelected {
            card,
            by: self.ctx.self_id.clone(),
        };
        if self.ctx.is_host() {
            self.broadcast_and_apply(relay, vec![message]);
        } else {
            self.send_to_host(relay, &message);
        }
    }

    /// Resolve a card. On the host this runs the authority directly; on a
    /// client it forwards intent and the result comes back as broadcasts.
    pub fn confirm_card(
        &mut self,
        relay: &mut dyn PacketRelay,
        card: CardId,
    ) -> Result<(), GameError> {
        if self.ctx.is_host() {
            let self_id = self.ctx.self_id.clone();
            let broadcasts = self.authority.confirm_card(card, &self_id)?;
            self.broadcast_and_apply(relay, broadcasts);
            Ok(())
        } else {
            self.send_to_host(
                relay,
                &GameMessage::CardConfirmPressed {
                    card,
                    by: self.ctx.self_id.clone(),
                },
            );
            Ok(())
        }
    }

    /// End the local team's turn. Silently ignored by the authority if this
    /// peer's team is not on turn.
    pub fn skip_turn(&mut self, relay: &mut dyn PacketRelay) {
        if self.ctx.is_host() {
            let self_id = self.ctx.self_id.clone();
            let team = self.self_team();
            let broadcasts = self.authority.skip_turn(&self_id, team);
            self.broadcast_and_apply(relay, broadcasts);
        } else {
            self.send_to_host(
                relay,
                &GameMessage::SkipTurnPressed {
                    by: self.ctx.self_id.clone(),
                },
            );
        }
    }

    /// Host-only: start generating a hint for the team on turn. A new
    /// request supersedes any generation still in flight.
    pub fn request_hint(&mut self, hint_source: &mut dyn HintSource) -> Result<(), LobbyError> {
        if !self.ctx.is_host() {
            return Err(LobbyError::NotAuthorized);
        }
        let request = self.hint_tracker.begin(self.authority.turn());
        hint_source.request(request);
        Ok(())
    }

    /// Send a loopback probe over the validated channel.
    pub fn send_test_ack(&mut self, relay: &mut dyn PacketRelay, nonce: u64) {
        let message = GameMessage::TestAck { nonce };
        if self.ctx.is_host() {
            self.broadcast_and_apply(relay, vec![message]);
        } else {
            self.send_to_host(relay, &message);
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    pub fn self_id(&self) -> &PeerId {
        &self.ctx.self_id
    }

    pub fn current_host(&self) -> &PeerId {
        &self.host
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn view(&self) -> &GameClientView {
        &self.view
    }

    /// Whether the client handshake has completed (clients only; the host
    /// has per-peer state instead, see `connected_peer_count`).
    pub fn is_connected(&self) -> bool {
        self.client_handshake
            .as_ref()
            .is_some_and(ClientHandshake::is_connected)
    }

    pub fn connected_peer_count(&self) -> usize {
        self.host_handshake
            .as_ref()
            .map(|h| h.connected_peers().count())
            .unwrap_or(0)
    }

    pub fn last_test_ack(&self) -> Option<&(PeerId, u64)> {
        self.last_test_ack.as_ref()
    }

    /// Descriptor of the running game, if one has started.
    pub fn game_descriptor(&self) -> Option<&SessionDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn pending_forces(&self) -> usize {
        self.teams.pending_forces()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn self_team(&self) -> Team {
        self.roster
            .get(&self.ctx.self_id)
            .map(|m| m.team)
            .unwrap_or_default()
    }

    fn on_rpc(&mut self, relay: &mut dyn PacketRelay, from: PeerId, message: GameMessage) {
        if self.ctx.is_host() {
            self.on_rpc_as_host(relay, from, message);
        } else {
            self.on_rpc_as_client(from, message);
        }
    }

    fn on_rpc_as_host(&mut self, relay: &mut dyn PacketRelay, from: PeerId, message: GameMessage) {
        // Game traffic is only trusted on a validated connection.
        let connected = self
            .host_handshake
            .as_ref()
            .is_some_and(|h| h.is_connected(&from));
        if !connected {
            debug!(%from, "dropping RPC from unconnected peer");
            return;
        }

        match message {
            GameMessage::CardConfirmPressed { card, .. } => {
                match self.authority.confirm_card(card, &from) {
                    Ok(broadcasts) => self.broadcast_and_apply(relay, broadcasts),
                    Err(err) => debug!(%from, %err, "confirm request rejected"),
                }
            }
            GameMessage::SkipTurnPressed { .. } => {
                let team = self
                    .roster
                    .get(&from)
                    .map(|m| m.team)
                    .unwrap_or_default();
                let broadcasts = self.authority.skip_turn(&from, team);
                self.broadcast_and_apply(relay, broadcasts);
            }
            GameMessage::CardSelected { .. } => {
                // Echo the selection to everyone else and render it locally.
                let peers: Vec<PeerId> = self.connected_peers_except(&from);
                if let Err(err) = broadcast_rpc(relay, peers.iter(), &self.channel, &message) {
                    warn!(%err, "failed to echo selection");
                }
                self.view.apply(&message);
            }
            GameMessage::TestAck { nonce } => {
                self.last_test_ack = Some((from.clone(), nonce));
                self.send_rpc_to(relay, &from, &GameMessage::TestAck { nonce });
            }
            other => {
                debug!(%from, ?other, "ignoring broadcast-type RPC from client");
            }
        }
    }

    fn on_rpc_as_client(&mut self, from: PeerId, message: GameMessage) {
        if from != self.host {
            debug!(%from, "dropping RPC from non-host peer");
            return;
        }
        // Game traffic is only trusted once the channel is validated. A
        // dropped broadcast is recoverable: score broadcasts are full
        // replays, never deltas.
        if !self.is_connected() {
            debug!("dropping RPC before handshake completed");
            return;
        }
        match message {
            GameMessage::TestAck { nonce } => {
                self.last_test_ack = Some((from, nonce));
            }
            message if message.is_intent() => {
                debug!("ignoring intent RPC on client");
            }
            message => self.view.apply(&message),
        }
    }

    fn connected_peers_except(&self, excluded: &PeerId) -> Vec<PeerId> {
        self.host_handshake
            .as_ref()
            .map(|h| {
                h.connected_peers()
                    .filter(|p| *p != excluded)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Broadcast to every connected peer and apply locally — the host
    /// renders through the same view path as its clients.
    fn broadcast_and_apply(&mut self, relay: &mut dyn PacketRelay, messages: Vec<GameMessage>) {
        let peers: Vec<PeerId> = self
            .host_handshake
            .as_ref()
            .map(|h| h.connected_peers().cloned().collect())
            .unwrap_or_default();
        for message in messages {
            if let Err(err) = broadcast_rpc(relay, peers.iter(), &self.channel, &message) {
                warn!(%err, "failed to broadcast");
            }
            self.view.apply(&message);
        }
    }

    fn send_to_host(&mut self, relay: &mut dyn PacketRelay, message: &GameMessage) {
        let host = self.host.clone();
        self.send_rpc_to(relay, &host, message);
    }

    fn send_rpc_to(&mut self, relay: &mut dyn PacketRelay, to: &PeerId, message: &GameMessage) {
        if let Err(err) = send_rpc(relay, to, &self.channel, message) {
            warn!(%to, %err, "failed to send RPC");
        }
    }
}

/// Random lowercase-alphanumeric game session id.
fn generate_game_id() -> String {
    let mut rng = rand::rng();
    (0..12)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}
