// Data-driven coordinator configuration.
//
// All tunable parameters of the coordination layer live here, loadable from
// JSON at startup. The coordinators never use magic numbers — capacities
// and timing windows are read from this struct, so balance and latency
// tuning never require a recompile. Fields carry serde defaults: a partial
// config file only overrides what it names.

use std::time::Duration;

use cluegrid_game::board::BoardComposition;
use serde::{Deserialize, Serialize};

/// Tunables for the whole peer stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Capacity of each playing team.
    pub team_capacity: u8,
    /// Debounce window for batched attribute writes, in milliseconds.
    pub write_debounce_ms: u64,
    /// Client handshake hello retry interval, in milliseconds.
    pub hello_retry_ms: u64,
    /// Minimum spacing between welcome re-sends per peer, in milliseconds.
    pub welcome_min_spacing_ms: u64,
    /// Card counts for the board deal.
    pub board: BoardComposition,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            team_capacity: 5,
            write_debounce_ms: 200,
            hello_retry_ms: 1000,
            welcome_min_spacing_ms: 750,
            board: BoardComposition::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.write_debounce_ms)
    }

    pub fn hello_retry(&self) -> Duration {
        Duration::from_millis(self.hello_retry_ms)
    }

    pub fn welcome_min_spacing(&self) -> Duration {
        Duration::from_millis(self.welcome_min_spacing_ms)
    }
}
