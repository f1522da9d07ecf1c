// Client-side replicated game state.
//
// Clients never execute turn logic — this view applies the host's
// broadcasts verbatim and answers UI queries. Application is idempotent and
// monotonic-safe: a `TurnChanged` older than the current counter is
// dropped, a repeated `CardRevealed` overwrites with the same value, and no
// broadcast is assumed to follow any other. The host feeds its own
// broadcasts through the same view so everyone renders identical state.

use std::collections::{BTreeMap, BTreeSet};

use cluegrid_protocol::message::{EndReason, GameMessage, Hint};
use cluegrid_protocol::types::{CardCategory, CardId, PeerId, Team, TurnCounter};
use tracing::debug;

/// Replicated view of the running game.
#[derive(Default)]
pub struct GameClientView {
    playing: bool,
    revealed: BTreeMap<CardId, CardCategory>,
    turn: Team,
    turn_counter: TurnCounter,
    team_a_remaining: u8,
    team_b_remaining: u8,
    /// The card some peer is tentatively pointing at, for UI echo.
    selected: Option<(CardId, PeerId)>,
    last_hint: Option<(Team, Hint)>,
    outcome: Option<(Team, EndReason)>,
}

impl GameClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the playing state (on session-start detection). Counters
    /// arrive with the host's initial `TurnChanged` — which may have been
    /// applied already, since no ordering holds between the attribute
    /// snapshot and relayed RPC traffic, so this must not discard state
    /// from the session being started. Leftovers from a finished game are
    /// dropped (the rematch path when the `None` reset was never observed).
    pub fn start_session(&mut self) {
        if self.outcome.is_some() {
            *self = Self::default();
        }
        self.playing = true;
    }

    pub fn is_playing(&self) -> bool {
        self.playing && self.outcome.is_none()
    }

    pub fn is_ended(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn turn(&self) -> Team {
        self.turn
    }

    pub fn turn_counter(&self) -> TurnCounter {
        self.turn_counter
    }

    pub fn remaining(&self, team: Team) -> u8 {
        match team {
            Team::A => self.team_a_remaining,
            Team::B => self.team_b_remaining,
            _ => 0,
        }
    }

    pub fn revealed(&self, card: CardId) -> Option<CardCategory> {
        self.revealed.get(&card).copied()
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.len()
    }

    /// Ids of every revealed card (used when a promoted host adopts this
    /// view as its confirmed set).
    pub fn revealed_cards(&self) -> BTreeSet<CardId> {
        self.revealed.keys().copied().collect()
    }

    pub fn selected(&self) -> Option<(CardId, &PeerId)> {
        self.selected.as_ref().map(|(card, peer)| (*card, peer))
    }

    pub fn last_hint(&self) -> Option<(Team, &Hint)> {
        self.last_hint.as_ref().map(|(team, hint)| (*team, hint))
    }

    pub fn outcome(&self) -> Option<(Team, EndReason)> {
        self.outcome
    }

    /// Apply one broadcast. Intent messages (client→host) are ignored here.
    pub fn apply(&mut self, message: &GameMessage) {
        match message {
            GameMessage::CardSelected { card, by } => {
                self.selected = Some((*card, by.clone()));
            }
            GameMessage::CardRevealed { card, category, .. } => {
                self.revealed.insert(*card, *category);
                // A reveal consumes the selection highlight.
                if self.selected.as_ref().is_some_and(|(c, _)| c == card) {
                    self.selected = None;
                }
            }
            GameMessage::TurnChanged {
                turn,
                turn_counter,
                team_a_remaining,
                team_b_remaining,
            } => {
                // Monotonic guard: equal counters are score replays and
                // must apply; only strictly older broadcasts are dropped.
                if *turn_counter < self.turn_counter {
                    debug!(
                        got = turn_counter.0,
                        current = self.turn_counter.0,
                        "dropping stale turn broadcast"
                    );
                    return;
                }
                self.turn = *turn;
                self.turn_counter = *turn_counter;
                self.team_a_remaining = *team_a_remaining;
                self.team_b_remaining = *team_b_remaining;
            }
            GameMessage::SkipTurn { .. } => {
                // Informational; the state change rides the TurnChanged
                // that follows.
            }
            GameMessage::HintGiven { team, hint } => {
                self.last_hint = Some((*team, hint.clone()));
            }
            GameMessage::GameEnded { winner, reason } => {
                self.outcome = Some((*winner, *reason));
            }
            GameMessage::CardConfirmPressed { .. }
            | GameMessage::SkipTurnPressed { .. }
            | GameMessage::TestAck { .. } => {}
        }
    }

    /// Drop all replicated state (leaving, or a rematch reset).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
