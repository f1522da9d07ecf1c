// Game-layer error taxonomy. Duplicate confirmations are deliberately NOT
// here — they are success-no-ops, never errors.

use cluegrid_protocol::types::CardId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// A turn operation arrived outside the playing phase.
    #[error("no game in progress")]
    NotPlaying,

    /// A confirmation named a card that is not on the board.
    #[error("unknown card {card}")]
    UnknownCard { card: CardId },
}
