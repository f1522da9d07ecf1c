// RPC messages exchanged between peers over the packet relay.
//
// One enum, `GameMessage`, defines the full RPC vocabulary. On the wire each
// message is JSON of the shape `{"type": "...", "payload": {...}}` — serde's
// adjacently-tagged representation. Client-to-host intent messages
// (`*_pressed`) and host-to-client broadcasts share the enum: direction is a
// protocol convention, not a type distinction, because the host also applies
// its own broadcasts locally through the same client-view path.
//
// Broadcast payloads that carry score state always carry the *full*
// counters, never deltas. A client that missed an intermediate broadcast
// converges on the next one.

use serde::{Deserialize, Serialize};

use crate::types::{CardCategory, CardId, PeerId, Team, TurnCounter};

/// A structured hint for the team currently guessing.
///
/// Produced by the opaque hint collaborator; this layer only transports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub word: String,
    pub count: u8,
}

/// Why the game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A team revealed all of its cards.
    AllCardsFound,
    /// A team revealed the assassin; the opposing team wins.
    Assassin,
}

/// The RPC envelope carried on the session's logical channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GameMessage {
    /// A peer is tentatively pointing at a card (UI echo, no authority).
    CardSelected { card: CardId, by: PeerId },
    /// Client → host: the requester wants this card resolved.
    CardConfirmPressed { card: CardId, by: PeerId },
    /// Host → all: a card has been resolved. Sent before any scoring
    /// mutation so the reveal renders even if the scoring broadcast lags.
    CardRevealed {
        card: CardId,
        category: CardCategory,
        is_assassin: bool,
    },
    /// Client → host: the requester wants to end their team's turn.
    SkipTurnPressed { by: PeerId },
    /// Host → all: a skip was accepted (precedes the matching turn change).
    SkipTurn { by: PeerId },
    /// Host → all: authoritative turn and score state. `turn_counter` only
    /// advances when the turn actually passes; a broadcast with an unchanged
    /// counter is a pure score replay.
    TurnChanged {
        turn: Team,
        turn_counter: TurnCounter,
        team_a_remaining: u8,
        team_b_remaining: u8,
    },
    /// Host → all: a hint for the team on turn.
    HintGiven { team: Team, hint: Hint },
    /// Host → all: the game is over.
    GameEnded { winner: Team, reason: EndReason },
    /// Loopback probe used by integration tests to verify the validated
    /// channel end-to-end.
    TestAck { nonce: u64 },
}

impl GameMessage {
    /// Whether this message is client intent that only the host acts on.
    pub fn is_intent(&self) -> bool {
        matches!(
            self,
            GameMessage::CardConfirmPressed { .. } | GameMessage::SkipTurnPressed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The `{"type", "payload"}` envelope shape is an external interface —
    /// pin it down, not just roundtripping.
    #[test]
    fn envelope_shape_is_type_payload() {
        let msg = GameMessage::CardConfirmPressed {
            card: CardId(7),
            by: PeerId::from("p1"),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "card_confirm_pressed");
        assert_eq!(json["payload"]["card"], 7);
        assert_eq!(json["payload"]["by"], "p1");
    }

    #[test]
    fn unit_like_payloads_still_tag() {
        let msg = GameMessage::TestAck { nonce: 99 };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "test_ack");
        assert_eq!(json["payload"]["nonce"], 99);
    }

    #[test]
    fn turn_changed_roundtrip() {
        let msg = GameMessage::TurnChanged {
            turn: Team::B,
            turn_counter: TurnCounter(12),
            team_a_remaining: 5,
            team_b_remaining: 3,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: GameMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn card_revealed_roundtrip() {
        let msg = GameMessage::CardRevealed {
            card: CardId(24),
            category: CardCategory::Assassin,
            is_assassin: true,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: GameMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn hint_given_roundtrip() {
        let msg = GameMessage::HintGiven {
            team: Team::A,
            hint: Hint {
                word: "river".into(),
                count: 3,
            },
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: GameMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn game_ended_roundtrip() {
        let msg = GameMessage::GameEnded {
            winner: Team::B,
            reason: EndReason::Assassin,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: GameMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn intent_classification() {
        assert!(
            GameMessage::CardConfirmPressed {
                card: CardId(0),
                by: PeerId::from("p"),
            }
            .is_intent()
        );
        assert!(GameMessage::SkipTurnPressed { by: PeerId::from("p") }.is_intent());
        assert!(!GameMessage::TestAck { nonce: 0 }.is_intent());
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let unknown = r#"{"type": "warp_board", "payload": {}}"#;
        let result: Result<GameMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
