// Host-side turn authority: card confirmation, scoring, turn advancement,
// and win detection.
//
// Only the host runs this machine; clients apply its broadcasts verbatim
// through `GameClientView`. The output of every operation is the ordered
// list of `GameMessage` broadcasts to send — the caller owns delivery (and
// the host feeds the same list into its own client view, so host and
// clients render through one code path).
//
// Ordering rule: `CardRevealed` is emitted *before* any scoring mutation's
// broadcast, so a client can render the reveal even when a later scoring
// broadcast is delayed or lost. Scoring broadcasts (`TurnChanged`) always
// replay the full counters; `turn_counter` advances only when the turn
// actually passes, so a broadcast with an unchanged counter is a pure
// score replay and safe to re-apply.

use std::collections::BTreeSet;

use cluegrid_protocol::message::{EndReason, GameMessage};
use cluegrid_protocol::types::{CardCategory, CardId, PeerId, Team, TurnCounter};
use tracing::{debug, info};

use crate::board::{Board, BoardComposition};
use crate::client_view::GameClientView;
use crate::error::GameError;

/// Lifecycle of one game on the authority side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GamePhase {
    #[default]
    Lobby,
    Playing,
    Ended,
}

/// The host's authoritative turn state.
#[derive(Default)]
pub struct GameTurnAuthority {
    phase: GamePhase,
    board: Option<Board>,
    turn: Team,
    turn_counter: TurnCounter,
    team_a_remaining: u8,
    team_b_remaining: u8,
    /// Consecutive correct guesses by the team on turn.
    streak: u32,
    /// Cards already resolved this game; repeats are success-no-ops.
    confirmed: BTreeSet<CardId>,
}

impl GameTurnAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
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

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Deal the board and enter the playing phase. Returns the initial
    /// `TurnChanged` broadcast announcing the starting team.
    pub fn start_game(&mut self, seed: u64, composition: &BoardComposition) -> Vec<GameMessage> {
        let board = Board::deal(seed, composition);
        self.turn = board.starting_team();
        self.team_a_remaining = board.cards_for(Team::A);
        self.team_b_remaining = board.cards_for(Team::B);
        self.board = Some(board);
        self.turn_counter = TurnCounter(1);
        self.streak = 0;
        self.confirmed.clear();
        self.phase = GamePhase::Playing;
        info!(seed, turn = %self.turn, "game started");
        vec![self.turn_broadcast()]
    }

    /// Adopt state from a client view — the migration path. A promoted host
    /// was a client applying broadcasts, so its view holds the replicated
    /// turn state; the board is re-dealt from the descriptor seed.
    pub fn adopt_from_view(
        &mut self,
        seed: u64,
        composition: &BoardComposition,
        view: &GameClientView,
    ) {
        let board = Board::deal(seed, composition);
        self.board = Some(board);
        self.turn = view.turn();
        self.turn_counter = view.turn_counter();
        self.team_a_remaining = view.remaining(Team::A);
        self.team_b_remaining = view.remaining(Team::B);
        self.streak = 0;
        self.confirmed = view.revealed_cards();
        self.phase = if view.is_ended() {
            GamePhase::Ended
        } else {
            GamePhase::Playing
        };
        info!(turn = %self.turn, counter = self.turn_counter.0, "authority adopted from view");
    }

    /// Resolve a card confirmation. Duplicates return an empty broadcast
    /// list — success, no state change, no second reveal.
    pub fn confirm_card(
        &mut self,
        card: CardId,
        requester: &PeerId,
    ) -> Result<Vec<GameMessage>, GameError> {
        if self.phase != GamePhase::Playing {
            return Err(GameError::NotPlaying);
        }
        if self.confirmed.contains(&card) {
            debug!(%card, %requester, "duplicate confirmation ignored");
            return Ok(Vec::new());
        }
        let category = self
            .board
            .as_ref()
            .and_then(|b| b.category(card))
            .ok_or(GameError::UnknownCard { card })?;

        self.confirmed.insert(card);

        // Reveal first: scoring state is untouched until this is queued.
        let mut out = vec![GameMessage::CardRevealed {
            card,
            category,
            is_assassin: category.is_assassin(),
        }];

        match category {
            CardCategory::Assassin => {
                let winner = self.turn.opposing();
                self.phase = GamePhase::Ended;
                info!(%card, %winner, "assassin revealed");
                out.push(GameMessage::GameEnded {
                    winner,
                    reason: EndReason::Assassin,
                });
            }
            CardCategory::Neutral => {
                self.pass_turn();
                out.push(self.turn_broadcast());
            }
            CardCategory::TeamA | CardCategory::TeamB => {
                let scoring_team = category
                    .scoring_team()
                    .unwrap_or(Team::None);
                self.decrement(scoring_team);

                if self.remaining(scoring_team) == 0 {
                    self.phase = GamePhase::Ended;
                    info!(%scoring_team, "all cards found");
                    out.push(self.turn_broadcast());
                    out.push(GameMessage::GameEnded {
                        winner: scoring_team,
                        reason: EndReason::AllCardsFound,
                    });
                } else if scoring_team == self.turn {
                    // Correct guess: turn continues, counter unchanged —
                    // this broadcast is a pure score replay.
                    self.streak += 1;
                    out.push(self.turn_broadcast());
                } else {
                    // Off-turn team's card: their score drops and the turn
                    // passes to them.
                    self.pass_turn();
                    out.push(self.turn_broadcast());
                }
            }
        }
        Ok(out)
    }

    /// Skip the current turn. Ignored (empty list) unless the requester's
    /// team is on turn — a racing skip from the wrong team is expected
    /// under latency and is dropped silently.
    pub fn skip_turn(&mut self, requester: &PeerId, requester_team: Team) -> Vec<GameMessage> {
        if self.phase != GamePhase::Playing {
            return Vec::new();
        }
        if requester_team != self.turn {
            debug!(%requester, %requester_team, turn = %self.turn, "dropping off-turn skip");
            return Vec::new();
        }
        self.pass_turn();
        vec![
            GameMessage::SkipTurn {
                by: requester.clone(),
            },
            self.turn_broadcast(),
        ]
    }

    fn pass_turn(&mut self) {
        self.turn = self.turn.opposing();
        self.turn_counter = TurnCounter(self.turn_counter.0 + 1);
        self.streak = 0;
    }

    fn decrement(&mut self, team: Team) {
        match team {
            Team::A => self.team_a_remaining = self.team_a_remaining.saturating_sub(1),
            Team::B => self.team_b_remaining = self.team_b_remaining.saturating_sub(1),
            _ => {}
        }
    }

    fn turn_broadcast(&self) -> GameMessage {
        GameMessage::TurnChanged {
            turn: self.turn,
            turn_counter: self.turn_counter,
            team_a_remaining: self.team_a_remaining,
            team_b_remaining: self.team_b_remaining,
        }
    }

    /// Drop all game state (leaving the lobby, or a rematch reset).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
