// Seam to the hint-generation collaborator.
//
// Hint generation (the language-model subsystem) is out of scope — it is
// consumed behind `HintSource`, an async-by-polling interface that fits the
// single-threaded tick: `request` starts a generation, `poll` is drained
// once per tick. `HintTracker` enforces the one-in-flight rule: each
// request gets a generation token, starting a new request supersedes the
// old one, and a result carrying a stale token is ignored rather than
// broadcast.

use cluegrid_protocol::message::Hint;
use cluegrid_protocol::types::Team;
use tracing::debug;

/// A hint generation request handed to the collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintRequest {
    /// Token identifying this generation; echoed back in the response.
    pub generation: u64,
    /// The team the hint is for.
    pub team: Team,
}

/// A completed generation from the collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintResponse {
    pub generation: u64,
    pub hint: Hint,
}

/// The opaque hint collaborator.
pub trait HintSource {
    /// Begin generating. Implementations may abandon any generation that is
    /// superseded before completing.
    fn request(&mut self, request: HintRequest);

    /// Non-blocking poll for a completed generation.
    fn poll(&mut self) -> Option<HintResponse>;
}

/// Tracks the single in-flight hint generation per lobby.
#[derive(Default)]
pub struct HintTracker {
    next_generation: u64,
    in_flight: Option<(u64, Team)>,
}

impl HintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a new generation, superseding any in-flight one (its result
    /// will be ignored when it eventually arrives).
    pub fn begin(&mut self, team: Team) -> HintRequest {
        self.next_generation += 1;
        if let Some((stale, _)) = self.in_flight.replace((self.next_generation, team)) {
            debug!(stale, "superseding in-flight hint generation");
        }
        HintRequest {
            generation: self.next_generation,
            team,
        }
    }

    /// Accept a response if it matches the current generation, yielding the
    /// hint and the team it was requested for. Stale results return `None`
    /// and leave a newer in-flight request pending.
    pub fn accept(&mut self, response: HintResponse) -> Option<(Team, Hint)> {
        match self.in_flight {
            Some((generation, team)) if generation == response.generation => {
                self.in_flight = None;
                Some((team, response.hint))
            }
            _ => {
                debug!(generation = response.generation, "dropping stale hint result");
                None
            }
        }
    }

    /// Abandon any in-flight generation (teardown or game end).
    pub fn clear(&mut self) {
        self.in_flight = None;
    }
}
