// Protocol-level error taxonomy.
//
// Nothing here is fatal. Malformed frames and messages are logged and
// dropped by the receive pump; channel mismatches are dropped silently —
// they are expected whenever a transport outlives a session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The binary frame failed structural validation (bad tag, truncated
    /// length prefix, invalid UTF-8, trailing bytes).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame decoded but its JSON payload is not a known `GameMessage`.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// The frame belongs to a different logical channel — a stale packet
    /// from a previous session reusing the same transport.
    #[error("channel mismatch: expected {expected:?}, got {got:?}")]
    ChannelMismatch { expected: String, got: String },
}
