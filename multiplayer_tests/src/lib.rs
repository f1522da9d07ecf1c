// Test-only rendezvous service and peer harness for integration tests.
//
// `MemoryRendezvous` is a faithful in-memory stand-in for the external
// service: a lobby attribute store with per-member sub-maps and a version
// counter standing in for change notifications, plus per-peer packet
// inboxes with an optional duplicate-delivery knob. `TestPeer` wraps a real
// `PeerSession` with adapter handles into the shared rendezvous, and
// `TestHarness` drives any number of peers from one virtual clock.
//
// The only test-specific code is the synchronous pump (`TestHarness::step`
// advancing the clock and delivering notifications); all coordination logic
// runs through the same `PeerSession` code paths as the live game.
//
// See also: `tests/lobby_convergence.rs` and `tests/game_flow.rs` for the
// scenario tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use cluegrid_game::{HintRequest, HintResponse, HintSource};
use cluegrid_lobby::{AttributeStore, LobbyEvent};
use cluegrid_net::PacketRelay;
use cluegrid_peer::{CoordinatorConfig, PeerSession};
use cluegrid_protocol::attributes::{AttributeMap, AttributeSnapshot, AttributeUpdate};
use cluegrid_protocol::message::Hint;
use cluegrid_protocol::types::PeerId;

/// Lobby session id shared by every peer in a harness.
pub const LOBBY_SESSION: &str = "lobby-under-test";

/// How far `TestHarness::settle` advances the virtual clock per step.
const STEP: Duration = Duration::from_millis(100);

/// Steps per `settle` call — 4 virtual seconds, enough for several debounce
/// flushes and handshake retries.
const SETTLE_STEPS: usize = 40;

// ---------------------------------------------------------------------------
// In-memory rendezvous service
// ---------------------------------------------------------------------------

/// Shared state of the fake rendezvous service.
pub struct MemoryRendezvous {
    lobby: AttributeMap,
    members: BTreeMap<PeerId, AttributeMap>,
    joinable: bool,
    /// Bumped on every attribute write; stands in for change notifications.
    version: u64,
    inboxes: BTreeMap<PeerId, VecDeque<(PeerId, Vec<u8>)>>,
    /// Deliver every packet twice — exercises duplicate-tolerance paths.
    pub duplicate_packets: bool,
}

impl MemoryRendezvous {
    fn new() -> Self {
        Self {
            lobby: AttributeMap::new(),
            members: BTreeMap::new(),
            joinable: true,
            version: 0,
            inboxes: BTreeMap::new(),
            duplicate_packets: false,
        }
    }

    fn snapshot(&self) -> AttributeSnapshot {
        AttributeSnapshot {
            lobby: self.lobby.clone(),
            members: self.members.clone(),
        }
    }

    fn apply(&mut self, from: &PeerId, update: AttributeUpdate) {
        for key in &update.remove {
            self.lobby.remove(key);
        }
        for (key, value) in update.set {
            self.lobby.insert(key, value);
        }
        if !update.member_set.is_empty() {
            // Writes from a vanished peer are no-ops, like the real service.
            if let Some(member) = self.members.get_mut(from) {
                for (key, value) in update.member_set {
                    member.insert(key, value);
                }
            }
        }
        self.version += 1;
    }

    fn send(&mut self, to: &PeerId, from: &PeerId, data: &[u8]) {
        // Packets to unknown/departed peers vanish, like the real relay.
        let Some(inbox) = self.inboxes.get_mut(to) else {
            return;
        };
        inbox.push_back((from.clone(), data.to_vec()));
        if self.duplicate_packets {
            inbox.push_back((from.clone(), data.to_vec()));
        }
    }

    fn recv(&mut self, peer: &PeerId) -> Option<(PeerId, Vec<u8>)> {
        self.inboxes.get_mut(peer)?.pop_front()
    }

    fn register(&mut self, peer: &PeerId) {
        self.inboxes.entry(peer.clone()).or_default();
        self.members.entry(peer.clone()).or_default();
        self.version += 1;
    }

    fn unregister(&mut self, peer: &PeerId) {
        self.inboxes.remove(peer);
        self.members.remove(peer);
        self.version += 1;
    }
}

pub type SharedRendezvous = Rc<RefCell<MemoryRendezvous>>;

/// One peer's handle onto the shared attribute store.
pub struct PeerStore {
    shared: SharedRendezvous,
    self_id: PeerId,
}

impl AttributeStore for PeerStore {
    fn get_all(&self) -> AttributeSnapshot {
        self.shared.borrow().snapshot()
    }

    fn apply(&mut self, update: AttributeUpdate) {
        self.shared.borrow_mut().apply(&self.self_id, update);
    }

    fn set_joinable(&mut self, joinable: bool) {
        self.shared.borrow_mut().joinable = joinable;
    }
}

/// One peer's handle onto the shared packet relay.
pub struct PeerRelay {
    shared: SharedRendezvous,
    self_id: PeerId,
}

impl PacketRelay for PeerRelay {
    fn send(&mut self, to: &PeerId, data: &[u8]) {
        self.shared.borrow_mut().send(to, &self.self_id, data);
    }

    fn try_recv(&mut self) -> Option<(PeerId, Vec<u8>)> {
        self.shared.borrow_mut().recv(&self.self_id)
    }
}

// ---------------------------------------------------------------------------
// Scripted hint collaborator
// ---------------------------------------------------------------------------

/// Hint source for tests: records requests; completes them on demand, or
/// automatically when `auto_word` is set.
#[derive(Default)]
pub struct ScriptedHintSource {
    pub auto_word: Option<String>,
    pub requests: Vec<HintRequest>,
    completed: VecDeque<HintResponse>,
}

impl ScriptedHintSource {
    /// Complete the most recent request with the given hint word.
    pub fn complete_last(&mut self, word: &str) {
        if let Some(request) = self.requests.last() {
            self.completed.push_back(HintResponse {
                generation: request.generation,
                hint: Hint {
                    word: word.to_owned(),
                    count: 2,
                },
            });
        }
    }
}

impl HintSource for ScriptedHintSource {
    fn request(&mut self, request: HintRequest) {
        if let Some(word) = &self.auto_word {
            self.completed.push_back(HintResponse {
                generation: request.generation,
                hint: Hint {
                    word: word.clone(),
                    count: 2,
                },
            });
        }
        self.requests.push(request);
    }

    fn poll(&mut self) -> Option<HintResponse> {
        self.completed.pop_front()
    }
}

// ---------------------------------------------------------------------------
// Test peer and harness
// ---------------------------------------------------------------------------

/// A real `PeerSession` plus its adapter handles and accumulated events.
pub struct TestPeer {
    pub id: PeerId,
    pub nickname: String,
    pub session: PeerSession,
    pub store: PeerStore,
    pub relay: PeerRelay,
    pub hints: ScriptedHintSource,
    pub events: Vec<LobbyEvent>,
    seen_version: u64,
}

impl TestPeer {
    /// One pump: tick the session, then deliver a change notification if
    /// the store has moved since this peer last looked.
    pub fn pump(&mut self, now: Instant) {
        self.session
            .tick(&mut self.store, &mut self.relay, &mut self.hints, now);
        let version = self.store.shared.borrow().version;
        if version != self.seen_version {
            self.seen_version = version;
            let events = self
                .session
                .on_attributes_changed(&mut self.store, &mut self.relay, now);
            self.events.extend(events);
        }
    }

    /// Count of accumulated events matching a predicate.
    pub fn count_events(&self, predicate: impl Fn(&LobbyEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

/// Drives any number of peers against one shared rendezvous from a single
/// virtual clock.
pub struct TestHarness {
    pub shared: SharedRendezvous,
    pub peers: Vec<TestPeer>,
    pub now: Instant,
    config: CoordinatorConfig,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            shared: Rc::new(RefCell::new(MemoryRendezvous::new())),
            peers: Vec::new(),
            now: Instant::now(),
            config,
        }
    }

    fn adapters(&self, id: &PeerId) -> (PeerStore, PeerRelay) {
        (
            PeerStore {
                shared: Rc::clone(&self.shared),
                self_id: id.clone(),
            },
            PeerRelay {
                shared: Rc::clone(&self.shared),
                self_id: id.clone(),
            },
        )
    }

    /// Add the hosting peer. Existing peers (if any) are handed to it as
    /// known peers, and everyone is notified of the new member.
    pub fn add_host(&mut self, id: &str, nickname: &str) {
        let peer_id = PeerId::from(id);
        self.shared.borrow_mut().register(&peer_id);
        let (mut store, relay) = self.adapters(&peer_id);

        let known: Vec<PeerId> = self.peers.iter().map(|p| p.id.clone()).collect();
        let session = PeerSession::start_as_host(
            self.config.clone(),
            LOBBY_SESSION,
            peer_id.clone(),
            nickname,
            &known,
            &mut store,
            self.now,
        );
        self.announce_join(&peer_id, nickname);
        self.peers.push(TestPeer {
            id: peer_id,
            nickname: nickname.to_owned(),
            session,
            store,
            relay,
            hints: ScriptedHintSource::default(),
            events: Vec::new(),
            seen_version: 0,
        });
    }

    /// Add a client of `host_id`, delivering join notifications both ways.
    pub fn add_client(&mut self, id: &str, nickname: &str, host_id: &str) {
        let peer_id = PeerId::from(id);
        self.shared.borrow_mut().register(&peer_id);
        let (store, relay) = self.adapters(&peer_id);

        let mut session = PeerSession::start_as_client(
            self.config.clone(),
            LOBBY_SESSION,
            peer_id.clone(),
            nickname,
            PeerId::from(host_id),
            self.now,
        );
        // The rendezvous tells a joiner who is already present.
        for existing in &self.peers {
            session.on_member_joined(existing.id.clone(), &existing.nickname, self.now);
        }
        self.announce_join(&peer_id, nickname);
        self.peers.push(TestPeer {
            id: peer_id,
            nickname: nickname.to_owned(),
            session,
            store,
            relay,
            hints: ScriptedHintSource::default(),
            events: Vec::new(),
            seen_version: 0,
        });
    }

    fn announce_join(&mut self, peer: &PeerId, nickname: &str) {
        let now = self.now;
        for existing in &mut self.peers {
            let events = existing.session.on_member_joined(peer.clone(), nickname, now);
            existing.events.extend(events);
        }
    }

    /// A peer leaves (or is kicked): it tears down synchronously, everyone
    /// else gets the leave notification, and the service forgets it.
    pub fn remove_peer(&mut self, id: &str) {
        let peer_id = PeerId::from(id);
        let now = self.now;
        if let Some(index) = self.peers.iter().position(|p| p.id == peer_id) {
            let mut leaving = self.peers.remove(index);
            leaving.session.leave();
        }
        for remaining in &mut self.peers {
            let events = remaining.session.on_member_left(&peer_id, now);
            remaining.events.extend(events);
        }
        self.shared.borrow_mut().unregister(&peer_id);
    }

    /// The rendezvous service promotes a new host; every peer is told.
    pub fn promote(&mut self, id: &str) {
        let new_host = PeerId::from(id);
        for peer in &mut self.peers {
            peer.session.on_host_changed(new_host.clone(), &mut peer.store);
        }
    }

    /// Advance the virtual clock one step and pump every peer.
    pub fn step(&mut self, dt: Duration) {
        self.now += dt;
        let now = self.now;
        for peer in &mut self.peers {
            peer.pump(now);
        }
    }

    /// Pump until timers and convergence passes have all had time to run.
    pub fn settle(&mut self) {
        for _ in 0..SETTLE_STEPS {
            self.step(STEP);
        }
    }

    pub fn peer(&self, id: &str) -> &TestPeer {
        let peer_id = PeerId::from(id);
        self.peers
            .iter()
            .find(|p| p.id == peer_id)
            .expect("unknown test peer")
    }

    pub fn peer_mut(&mut self, id: &str) -> &mut TestPeer {
        let peer_id = PeerId::from(id);
        self.peers
            .iter_mut()
            .find(|p| p.id == peer_id)
            .expect("unknown test peer")
    }

    /// Current full attribute snapshot, as any peer would read it.
    pub fn snapshot(&self) -> AttributeSnapshot {
        self.shared.borrow().snapshot()
    }

    pub fn is_joinable(&self) -> bool {
        self.shared.borrow().joinable
    }

    pub fn set_duplicate_packets(&mut self, enabled: bool) {
        self.shared.borrow_mut().duplicate_packets = enabled;
    }
}
