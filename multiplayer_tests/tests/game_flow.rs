// End-to-end turn engine scenarios.
//
// Every test boots a host and a client into a running game (teams settled,
// descriptor published, handshake validated), then drives confirmations,
// skips, hints, and host migration through the real RPC path. Card
// categories are recovered in the test by re-dealing the board from the
// published seed — exactly what every peer does in production.

use cluegrid_game::{Board, BoardComposition};
use cluegrid_lobby::Role;
use cluegrid_protocol::attributes::SessionDescriptor;
use cluegrid_protocol::types::{CardId, PeerId, Team};
use multiplayer_tests::TestHarness;

/// Opt-in log output for debugging: `RUST_LOG=debug cargo test`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Host on team A, client on team B, game started and handshakes settled.
fn playing_harness() -> TestHarness {
    init_logging();
    let mut harness = TestHarness::new();
    harness.add_host("host", "Host");
    harness.add_client("p1", "PlayerOne", "host");
    harness.settle();

    for (peer, team) in [("host", Team::A), ("p1", Team::B)] {
        let now = harness.now;
        harness
            .peer_mut(peer)
            .session
            .request_join(team, now)
            .unwrap();
        harness.settle();
    }

    let now = harness.now;
    {
        let peer = harness.peer_mut("host");
        peer.session.start_game(&mut peer.store, now).unwrap();
    }
    harness.settle();
    assert!(harness.peer("host").session.view().is_playing());
    assert!(harness.peer("p1").session.view().is_playing());
    harness
}

/// Re-deal the board from the published descriptor, as any peer would.
fn board_of(harness: &TestHarness) -> Board {
    let descriptor = SessionDescriptor::read(&harness.snapshot()).unwrap();
    Board::deal(descriptor.seed, &BoardComposition::default())
}

/// First unrevealed card (per the host's view) belonging to `team`.
fn unrevealed_card_of(harness: &TestHarness, board: &Board, team: Team) -> CardId {
    let view = harness.peer("host").session.view();
    (0..25)
        .map(CardId)
        .find(|card| {
            view.revealed(*card).is_none()
                && board.category(*card).unwrap().scoring_team() == Some(team)
        })
        .expect("team has unrevealed cards")
}

/// The test peer whose team is currently on turn (host is A, client is B).
fn peer_on_turn(harness: &TestHarness) -> &'static str {
    match harness.peer("host").session.view().turn() {
        Team::A => "host",
        Team::B => "p1",
        other => panic!("unexpected turn {other}"),
    }
}

#[test]
fn reveal_and_counters_converge_on_all_peers() {
    let mut harness = playing_harness();
    let board = board_of(&harness);
    let starting = board.starting_team();
    let card = unrevealed_card_of(&harness, &board, starting);

    {
        let peer = harness.peer_mut("host");
        peer.session.confirm_card(&mut peer.relay, card).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert_eq!(view.revealed(card), board.category(card), "peer {id}");
        // Correct guess for the starting team: turn kept, one card down.
        assert_eq!(view.turn(), starting, "peer {id}");
        assert_eq!(view.remaining(starting), 8, "peer {id}");
        assert_eq!(view.remaining(starting.opposing()), 8, "peer {id}");
    }
    assert_eq!(
        harness.peer("host").session.view().turn_counter(),
        harness.peer("p1").session.view().turn_counter()
    );
}

#[test]
fn client_confirm_intent_round_trips_through_host() {
    let mut harness = playing_harness();
    let board = board_of(&harness);
    let starting = board.starting_team();
    let card = unrevealed_card_of(&harness, &board, starting.opposing());

    // The client forwards intent; the authority resolves and broadcasts.
    {
        let peer = harness.peer_mut("p1");
        peer.session.confirm_card(&mut peer.relay, card).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert_eq!(view.revealed(card), board.category(card), "peer {id}");
        // The off-turn team's card was revealed: turn passes to them.
        assert_eq!(view.turn(), starting.opposing(), "peer {id}");
        assert_eq!(view.remaining(starting.opposing()), 7, "peer {id}");
    }
}

#[test]
fn duplicate_confirm_rpcs_are_noops() {
    let mut harness = playing_harness();
    // Every packet (intent and broadcast alike) is delivered twice.
    harness.set_duplicate_packets(true);

    let board = board_of(&harness);
    let starting = board.starting_team();
    let card = unrevealed_card_of(&harness, &board, starting);

    {
        let peer = harness.peer_mut("p1");
        peer.session.confirm_card(&mut peer.relay, card).unwrap();
        // The user mashes the button; the wire duplicates on top of that.
        peer.session.confirm_card(&mut peer.relay, card).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert_eq!(view.revealed_count(), 1, "peer {id}");
        // Exactly one decrement despite four identical intents arriving.
        assert_eq!(view.remaining(starting), 8, "peer {id}");
    }
    assert_eq!(
        harness.peer("host").session.view().turn_counter(),
        harness.peer("p1").session.view().turn_counter()
    );
}

#[test]
fn skip_only_honored_from_team_on_turn() {
    let mut harness = playing_harness();
    let on_turn = peer_on_turn(&harness);
    let off_turn = if on_turn == "host" { "p1" } else { "host" };
    let turn_before = harness.peer("host").session.view().turn();

    // A racing skip from the wrong team is silently dropped.
    {
        let peer = harness.peer_mut(off_turn);
        peer.session.skip_turn(&mut peer.relay);
    }
    harness.settle();
    assert_eq!(harness.peer("host").session.view().turn(), turn_before);

    // The team on turn may skip; everyone converges on the new turn.
    {
        let peer = harness.peer_mut(on_turn);
        peer.session.skip_turn(&mut peer.relay);
    }
    harness.settle();
    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert_eq!(view.turn(), turn_before.opposing(), "peer {id}");
    }
}

#[test]
fn turn_counter_strictly_increases_and_converges() {
    let mut harness = playing_harness();
    let mut last = harness.peer("host").session.view().turn_counter();

    for _ in 0..4 {
        let on_turn = peer_on_turn(&harness);
        {
            let peer = harness.peer_mut(on_turn);
            peer.session.skip_turn(&mut peer.relay);
        }
        harness.settle();

        let host_counter = harness.peer("host").session.view().turn_counter();
        let client_counter = harness.peer("p1").session.view().turn_counter();
        assert!(host_counter > last);
        assert_eq!(host_counter, client_counter);
        last = host_counter;
    }
}

#[test]
fn assassin_ends_game_everywhere() {
    let mut harness = playing_harness();
    let board = board_of(&harness);
    let expected_winner = harness
        .peer("host")
        .session
        .view()
        .turn()
        .opposing();
    let assassin = (0..25)
        .map(CardId)
        .find(|card| board.category(*card).unwrap().is_assassin())
        .unwrap();

    {
        let peer = harness.peer_mut("host");
        peer.session.confirm_card(&mut peer.relay, assassin).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert!(view.is_ended(), "peer {id}");
        let (winner, _) = view.outcome().unwrap();
        assert_eq!(winner, expected_winner, "peer {id}");
    }
}

#[test]
fn hint_broadcast_reaches_every_peer() {
    let mut harness = playing_harness();
    let turn = harness.peer("host").session.view().turn();

    {
        let peer = harness.peer_mut("host");
        peer.hints.auto_word = Some("lantern".into());
        peer.session.request_hint(&mut peer.hints).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        let (team, hint) = view.last_hint().expect("hint delivered");
        assert_eq!(team, turn, "peer {id}");
        assert_eq!(hint.word, "lantern", "peer {id}");
    }
}

#[test]
fn test_ack_round_trips_over_the_validated_channel() {
    let mut harness = playing_harness();

    {
        let peer = harness.peer_mut("p1");
        peer.session.send_test_ack(&mut peer.relay, 7);
    }
    harness.settle();

    assert_eq!(
        harness.peer("host").session.last_test_ack(),
        Some(&(PeerId::from("p1"), 7))
    );
    // The host echoed it back.
    assert_eq!(
        harness.peer("p1").session.last_test_ack(),
        Some(&(PeerId::from("host"), 7))
    );
}

#[test]
fn host_migration_rederives_authority_from_replicated_state() {
    let mut harness = playing_harness();
    let board = board_of(&harness);
    let starting = board.starting_team();

    // One card resolved under the original host.
    let first = unrevealed_card_of(&harness, &board, starting);
    {
        let peer = harness.peer_mut("host");
        peer.session.confirm_card(&mut peer.relay, first).unwrap();
    }
    harness.settle();

    // The rendezvous service promotes the client; the old host follows it.
    harness.promote("p1");
    harness.settle();
    assert_eq!(harness.peer("p1").session.role(), Role::Host);
    assert_eq!(harness.peer("host").session.role(), Role::Client);
    assert!(harness.peer("host").session.is_connected());

    // The new host's authority picked up where replication left off.
    let second = unrevealed_card_of(&harness, &board, starting);
    {
        let peer = harness.peer_mut("p1");
        peer.session.confirm_card(&mut peer.relay, second).unwrap();
    }
    harness.settle();

    for id in ["host", "p1"] {
        let view = harness.peer(id).session.view();
        assert_eq!(view.revealed(first), board.category(first), "peer {id}");
        assert_eq!(view.revealed(second), board.category(second), "peer {id}");
        assert_eq!(view.remaining(starting), 7, "peer {id}");
        assert_eq!(view.turn(), starting, "peer {id}");
    }
}
