// Handshake state machines that validate a logical channel over the raw
// relay before any game traffic is trusted.
//
// Client role:  Idle → HelloSent → Connected
//   Sends `ClientHello{self_id}` immediately on start, then re-sends on a
//   fixed interval until a `HostWelcome` carrying the expected session id
//   arrives. Retry is unconditional — it does not matter whether the host
//   was listening before the client started. Once connected, retries stop
//   permanently and further welcomes are ignored. There is no timeout: a
//   client that is never welcomed retries until the caller cancels (the
//   relay has its own liveness detection).
//
// Host role: per-remote-peer AwaitingHello → PerPeerConnected
//   The host has no single "connected" state, only a set of connected
//   peers. A hello from an unknown peer marks it connected and replies
//   `HostWelcome`; a hello from a known peer (the client's blind retries
//   racing the welcome) is answered again, rate-limited to one welcome per
//   spacing window so a hot retry loop cannot flood the relay.
//
// All timestamps are passed in by the driving tick — these machines never
// read the clock, which keeps them deterministic under test.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use cluegrid_protocol::framing::{Frame, encode_frame};
use cluegrid_protocol::types::PeerId;
use tracing::{debug, warn};

use crate::relay::PacketRelay;

/// Client-side handshake states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClientState {
    Idle,
    HelloSent,
    Connected,
}

/// Client side of the handshake: one per session.
pub struct ClientHandshake {
    channel: String,
    session_id: String,
    self_id: PeerId,
    host: PeerId,
    retry_interval: Duration,
    state: ClientState,
    last_hello: Option<Instant>,
    cancelled: bool,
}

impl ClientHandshake {
    pub fn new(
        channel: &str,
        session_id: &str,
        self_id: PeerId,
        host: PeerId,
        retry_interval: Duration,
    ) -> Self {
        Self {
            channel: channel.to_owned(),
            session_id: session_id.to_owned(),
            self_id,
            host,
            retry_interval,
            state: ClientState::Idle,
            last_hello: None,
            cancelled: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// Stop retrying without reaching `Connected` — the caller is abandoning
    /// the session (leaving the lobby).
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Drive the retry timer. Sends the first hello when idle, re-sends when
    /// the retry interval has elapsed. No-op once connected or cancelled.
    pub fn tick(&mut self, relay: &mut dyn PacketRelay, now: Instant) {
        if self.cancelled || self.state == ClientState::Connected {
            return;
        }
        let due = match self.last_hello {
            None => true,
            Some(last) => now.duration_since(last) >= self.retry_interval,
        };
        if !due {
            return;
        }
        self.send_hello(relay);
        self.state = ClientState::HelloSent;
        self.last_hello = Some(now);
    }

    /// Apply an inbound `HostWelcome`. Returns true if this welcome moved
    /// the client into `Connected` (idempotent: repeats return false).
    pub fn on_welcome(&mut self, from: &PeerId, session_id: &str) -> bool {
        if session_id != self.session_id {
            // Channel filtering makes this rare; a foreign welcome on a
            // matching channel is dropped rather than trusted.
            warn!(%from, got = %session_id, expected = %self.session_id,
                  "dropping welcome for wrong session");
            return false;
        }
        if from != &self.host {
            warn!(%from, "dropping welcome from unexpected peer");
            return false;
        }
        if self.state == ClientState::Connected {
            return false;
        }
        self.state = ClientState::Connected;
        debug!(host = %self.host, "handshake connected");
        true
    }

    fn send_hello(&self, relay: &mut dyn PacketRelay) {
        let frame = Frame::client_hello(&self.channel, self.self_id.clone());
        match encode_frame(&frame) {
            Ok(datagram) => relay.send(&self.host, &datagram),
            Err(err) => warn!(%err, "failed to encode hello frame"),
        }
    }
}

/// Host side of the handshake: tracks which peers have been welcomed and
/// rate-limits welcome re-sends per peer.
pub struct HostHandshake {
    channel: String,
    session_id: String,
    welcome_min_spacing: Duration,
    /// Connected peers and the instant of the last welcome sent to each.
    connected: BTreeMap<PeerId, Instant>,
}

impl HostHandshake {
    pub fn new(channel: &str, session_id: &str, welcome_min_spacing: Duration) -> Self {
        Self {
            channel: channel.to_owned(),
            session_id: session_id.to_owned(),
            welcome_min_spacing,
            connected: BTreeMap::new(),
        }
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected.contains_key(peer)
    }

    /// Peers that have completed the handshake, in stable order.
    pub fn connected_peers(&self) -> impl Iterator<Item = &PeerId> {
        self.connected.keys()
    }

    /// Handle an inbound `ClientHello`. Returns true if `peer` was newly
    /// connected by this hello.
    pub fn on_hello(&mut self, relay: &mut dyn PacketRelay, peer: &PeerId, now: Instant) -> bool {
        match self.connected.get(peer) {
            None => {
                self.send_welcome(relay, peer);
                self.connected.insert(peer.clone(), now);
                debug!(%peer, "peer connected");
                true
            }
            Some(last_welcome) => {
                // Blind client retry — answer again, but not faster than the
                // spacing window.
                if now.duration_since(*last_welcome) >= self.welcome_min_spacing {
                    self.send_welcome(relay, peer);
                    self.connected.insert(peer.clone(), now);
                } else {
                    debug!(%peer, "suppressing welcome re-send (rate limit)");
                }
                false
            }
        }
    }

    /// Forget a peer that left the lobby so a future hello re-handshakes.
    pub fn remove_peer(&mut self, peer: &PeerId) {
        self.connected.remove(peer);
    }

    /// Drop all handshake state (session teardown).
    pub fn clear(&mut self) {
        self.connected.clear();
    }

    fn send_welcome(&self, relay: &mut dyn PacketRelay, peer: &PeerId) {
        let frame = Frame::host_welcome(&self.channel, &self.session_id);
        match encode_frame(&frame) {
            Ok(datagram) => relay.send(peer, &datagram),
            Err(err) => warn!(%err, "failed to encode welcome frame"),
        }
    }
}
