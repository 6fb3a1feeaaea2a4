use super::*;
use crate::auth::MemoryAuthorizer;
use crate::store::{MemoryStore, SessionStore};
use chess_core::{Board, Game};
use tokio::sync::mpsc::{self, UnboundedReceiver};

struct Peer {
    client: Client,
    rx: UnboundedReceiver<ServerMessage>,
    token: String,
}

impl Peer {
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

/// Game 1 with alice as white and bob as black; carol has no seat.
fn setup() -> (AppState, GameId) {
    setup_with(Game::new())
}

/// Like [`setup`], with game 1 starting from `game` instead of the opening.
fn setup_with(game: Game) -> (AppState, GameId) {
    let auth = MemoryAuthorizer::new();
    for name in ["alice", "bob", "carol"] {
        auth.insert(format!("t-{name}"), name).unwrap();
    }
    let store = Arc::new(MemoryStore::new());
    let id = store.create_game("casual").unwrap();
    let mut session = store.get_game(id).unwrap();
    session.game = game;
    store.put_game(id, session).unwrap();

    let coordinator = SessionCoordinator::new(store);
    coordinator.join_game(id, Color::White, "alice").unwrap();
    coordinator.join_game(id, Color::Black, "bob").unwrap();
    let state = AppState::new(
        Arc::new(coordinator),
        Arc::new(ConnectionHub::new()),
        Arc::new(auth),
    );
    (state, id)
}

fn peer(state: &AppState, name: &str) -> Peer {
    let (tx, rx) = mpsc::unbounded_channel();
    Peer {
        client: Client::new(state.hub.next_connection_id(), tx),
        rx,
        token: format!("t-{name}"),
    }
}

fn send(state: &AppState, p: &Peer, cmd: UserCommand) {
    handle_command(state, &p.client, cmd);
}

fn connect_cmd(p: &Peer, game_id: GameId) -> UserCommand {
    UserCommand::Connect {
        auth_token: p.token.clone(),
        game_id,
    }
}

fn move_cmd(p: &Peer, game_id: GameId, m: &str) -> UserCommand {
    UserCommand::MakeMove {
        auth_token: p.token.clone(),
        game_id,
        mv: Move::from_coord(m).unwrap(),
    }
}

fn is_load(m: &ServerMessage) -> bool {
    matches!(m, ServerMessage::LoadGame { .. })
}

fn notes(msgs: &[ServerMessage]) -> Vec<&str> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::Notification { message } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

fn errors(msgs: &[ServerMessage]) -> Vec<&str> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::Error { message } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

/// alice, bob and carol all connected, inboxes drained.
fn table() -> (AppState, GameId, Peer, Peer, Peer) {
    table_with(Game::new())
}

fn table_with(game: Game) -> (AppState, GameId, Peer, Peer, Peer) {
    let (state, id) = setup_with(game);
    let mut a = peer(&state, "alice");
    let mut b = peer(&state, "bob");
    let mut c = peer(&state, "carol");
    for p in [&a, &b, &c] {
        send(&state, p, connect_cmd(p, id));
    }
    a.drain();
    b.drain();
    c.drain();
    (state, id, a, b, c)
}

#[test]
fn test_connect_notifies_others_and_loads_sender() {
    let (state, id) = setup();
    let mut a = peer(&state, "alice");
    let mut c = peer(&state, "carol");

    send(&state, &a, connect_cmd(&a, id));
    let got = a.drain();
    assert_eq!(got.len(), 1);
    assert!(is_load(&got[0]));

    send(&state, &c, connect_cmd(&c, id));
    assert_eq!(notes(&a.drain()), ["carol connected as an observer"]);
    let got = c.drain();
    assert_eq!(got.len(), 1);
    assert!(is_load(&got[0]));

    let mut b = peer(&state, "bob");
    send(&state, &b, connect_cmd(&b, id));
    assert_eq!(notes(&a.drain()), ["bob connected as player black"]);
    assert_eq!(notes(&c.drain()), ["bob connected as player black"]);
    assert!(notes(&b.drain()).is_empty());
}

#[test]
fn test_connect_errors() {
    let (state, id) = setup();
    let mut a = peer(&state, "alice");

    send(&state, &a, connect_cmd(&a, 42));
    assert_eq!(errors(&a.drain()), ["Error: game 42 does not exist"]);

    let bad = UserCommand::Connect {
        auth_token: "forged".into(),
        game_id: id,
    };
    send(&state, &a, bad);
    assert_eq!(errors(&a.drain()), ["Error: unauthorized"]);
    assert!(state.hub.connections(id).is_empty());
}

#[test]
fn test_make_move_fan_out() {
    let (state, id, mut a, mut b, mut c) = table();

    send(&state, &a, move_cmd(&a, id, "e2e4"));

    let (ga, gb, gc) = (a.drain(), b.drain(), c.drain());
    // exactly one state broadcast per connection
    for got in [&ga, &gb, &gc] {
        assert_eq!(got.iter().filter(|m| is_load(m)).count(), 1);
        assert!(is_load(&got[0]));
    }
    // one move notification, to everyone but the mover
    assert!(notes(&ga).is_empty());
    assert_eq!(notes(&gb), ["alice moved e2 to e4"]);
    assert_eq!(notes(&gc), ["alice moved e2 to e4"]);

    let ServerMessage::LoadGame { game } = &gc[0] else {
        unreachable!()
    };
    assert_eq!(game.game.current_turn(), Color::Black);
}

#[test]
fn test_invalid_move_goes_to_sender_only() {
    let (state, id, mut a, mut b, mut c) = table();

    send(&state, &a, move_cmd(&a, id, "e2e5"));
    assert_eq!(errors(&a.drain()), ["Error: invalid move: e2e5 is not a legal move"]);
    assert!(b.drain().is_empty());
    assert!(c.drain().is_empty());

    // bob cannot move on white's turn
    send(&state, &b, move_cmd(&b, id, "e7e5"));
    assert_eq!(errors(&b.drain()), ["Error: invalid move: it is white's turn"]);
    assert!(a.drain().is_empty());

    // observers cannot move at all
    send(&state, &c, move_cmd(&c, id, "e2e4"));
    assert_eq!(
        errors(&c.drain()),
        ["Error: invalid move: observers cannot make moves"]
    );
}

#[test]
fn test_move_requires_connection() {
    let (state, id) = setup();
    let mut a = peer(&state, "alice");
    send(&state, &a, move_cmd(&a, id, "e2e4"));
    assert_eq!(
        errors(&a.drain()),
        ["Error: bad request: not connected to game 1"]
    );
}

#[test]
fn test_token_must_match_connection() {
    let (state, id, a, mut b, _c) = table();
    // bob's token on alice's connection
    let cmd = UserCommand::MakeMove {
        auth_token: b.token.clone(),
        game_id: id,
        mv: Move::from_coord("e2e4").unwrap(),
    };
    handle_command(&state, &a.client, cmd);
    assert_eq!(state.coordinator.game(id).unwrap().game.current_turn(), Color::White);
    assert!(b.drain().is_empty());
}

#[test]
fn test_check_notification_order() {
    let (state, id, mut a, mut b, mut c) = table();
    for (p, m) in [(&a, "e2e4"), (&b, "f7f6"), (&a, "d2d4")] {
        send(&state, p, move_cmd(p, id, m));
    }
    a.drain();
    b.drain();
    c.drain();

    send(&state, &b, move_cmd(&b, id, "e7e6"));
    send(&state, &a, move_cmd(&a, id, "d1h5"));

    let got = c.drain();
    // bob's move: state + note, then alice's move: state + note + check
    assert!(is_load(&got[0]));
    assert!(is_load(&got[2]));
    assert_eq!(
        notes(&got),
        [
            "bob moved e7 to e6",
            "alice moved d1 to h5",
            "bob (black) is in check",
        ]
    );
    assert_eq!(notes(&a.drain()), ["bob moved e7 to e6", "bob (black) is in check"]);
}

#[test]
fn test_checkmate_ends_game() {
    let (state, id, mut a, mut b, mut c) = table();
    for (p, m) in [(&a, "f2f3"), (&b, "e7e5"), (&a, "g2g4"), (&b, "d8h4")] {
        send(&state, p, move_cmd(p, id, m));
    }
    let got = c.drain();
    let tail = &got[got.len() - 4..];
    assert!(is_load(&tail[0]));
    assert_eq!(
        notes(tail),
        [
            "bob moved d8 to h4",
            "alice (white) is in checkmate. black wins"
        ]
    );
    let ServerMessage::LoadGame { game } = &tail[3] else {
        panic!("expected final state last, got {:?}", tail[3]);
    };
    assert!(game.game.is_game_over());

    a.drain();
    b.drain();
    send(&state, &a, move_cmd(&a, id, "a2a3"));
    assert_eq!(errors(&a.drain()), ["Error: invalid move: the game is over"]);
    assert!(c.drain().is_empty());
}

#[test]
fn test_leave_notifies_remaining() {
    let (state, id, mut a, mut b, mut c) = table();
    let leave = UserCommand::Leave {
        auth_token: c.token.clone(),
        game_id: id,
    };
    send(&state, &c, leave.clone());
    assert_eq!(notes(&a.drain()), ["carol left the game"]);
    assert_eq!(notes(&b.drain()), ["carol left the game"]);
    assert!(c.drain().is_empty());
    assert_eq!(state.hub.connections(id).len(), 2);

    // seat assignments survive leaving
    let leave_a = UserCommand::Leave {
        auth_token: a.token.clone(),
        game_id: id,
    };
    send(&state, &a, leave_a);
    assert_eq!(
        state.coordinator.get_player(id, Color::White).unwrap().as_deref(),
        Some("alice")
    );

    send(&state, &c, leave);
    assert_eq!(
        errors(&c.drain()),
        ["Error: bad request: not connected to game 1"]
    );
}

#[test]
fn test_resign() {
    let (state, id, mut a, mut b, mut c) = table();
    let resign = |p: &Peer| UserCommand::Resign {
        auth_token: p.token.clone(),
        game_id: id,
    };

    send(&state, &c, resign(&c));
    assert_eq!(errors(&c.drain()), ["Error: invalid move: observers cannot resign"]);

    send(&state, &b, resign(&b));
    for got in [a.drain(), b.drain(), c.drain()] {
        assert_eq!(got.len(), 2);
        assert!(is_load(&got[0]));
        assert_eq!(notes(&got), ["bob resigned. white wins"]);
    }
    assert!(state.coordinator.game(id).unwrap().game.is_game_over());

    // a second resignation is rejected and nobody else hears about it
    let before = state.coordinator.game(id).unwrap();
    send(&state, &a, resign(&a));
    assert_eq!(
        errors(&a.drain()),
        ["Error: invalid move: the game is already over"]
    );
    assert!(b.drain().is_empty());
    assert!(c.drain().is_empty());
    assert_eq!(state.coordinator.game(id).unwrap(), before);
}

#[test]
fn test_stalemate_ends_game() {
    let board = Board::from_diagram(
        "k.......
         ..K.....
         ...Q....
         ........
         ........
         ........
         ........
         ........",
    )
    .unwrap();
    let (state, id, mut a, mut b, mut c) = table_with(Game::with_board(board, Color::White));

    send(&state, &a, move_cmd(&a, id, "d6b6"));

    let got = c.drain();
    assert_eq!(got.len(), 4);
    assert!(is_load(&got[0]));
    assert_eq!(
        notes(&got),
        [
            "alice moved d6 to b6",
            "bob (black) is in stalemate. The game is a draw",
        ]
    );
    let ServerMessage::LoadGame { game } = &got[3] else {
        panic!("expected final state last, got {:?}", got[3]);
    };
    assert!(game.game.is_game_over());
    assert!(game.game.is_in_stalemate(Color::Black));

    // the mover gets both states and the stalemate notice, not its own move
    let mine = a.drain();
    assert_eq!(mine.len(), 3);
    assert!(is_load(&mine[0]) && is_load(&mine[2]));

    b.drain();
    send(&state, &b, move_cmd(&b, id, "a8a7"));
    assert_eq!(errors(&b.drain()), ["Error: invalid move: the game is over"]);
    assert!(a.drain().is_empty());
    assert!(c.drain().is_empty());
}

#[test]
fn test_broadcasts_follow_move_order() {
    let (state, id, a, b, mut c) = table();
    let state = Arc::new(state);

    // both players shuffle a knight as fast as they can; rejected attempts
    // (wrong turn) just retry
    let players: Vec<_> = [(a, ["g1f3", "f3g1"]), (b, ["g8f6", "f6g8"])]
        .into_iter()
        .map(|(mut p, cycle)| {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                let mut done = 0;
                while done < 20 {
                    send(&state, &p, move_cmd(&p, id, cycle[done % 2]));
                    // the reply to our own command is in the inbox by now;
                    // only it can be an error
                    if errors(&p.drain()).is_empty() {
                        done += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        })
        .collect();
    for t in players {
        t.join().unwrap();
    }

    let turns: Vec<Color> = c
        .drain()
        .iter()
        .filter_map(|m| match m {
            ServerMessage::LoadGame { game } => Some(game.game.current_turn()),
            _ => None,
        })
        .collect();
    assert_eq!(turns.len(), 40);
    for (i, turn) in turns.iter().enumerate() {
        let expected = if i % 2 == 0 { Color::Black } else { Color::White };
        assert_eq!(*turn, expected, "snapshot {i} out of order");
    }
}

#[test]
fn test_malformed_frame() {
    let (state, _) = setup();
    let mut a = peer(&state, "alice");
    handle_text(&state, &a.client, "{not json");
    let errs = a.drain();
    assert_eq!(errs.len(), 1);
    assert!(errors(&errs)[0].starts_with("Error: bad request:"));
}

#[test]
fn test_disconnect_behaves_like_leave() {
    let (state, id, mut a, mut b, c) = table();
    disconnect(&state, &c.client);
    assert_eq!(notes(&a.drain()), ["carol left the game"]);
    assert_eq!(notes(&b.drain()), ["carol left the game"]);
    assert_eq!(state.hub.connections(id).len(), 2);
}

#[test]
fn test_player_label() {
    let (state, id) = setup();
    assert_eq!(player_label(&state, id, Color::White), "alice (white)");
    // a failed lookup still yields a usable label
    assert_eq!(player_label(&state, 99, Color::Black), "black");

    let open = state.coordinator.create_game("open").unwrap();
    assert_eq!(player_label(&state, open, Color::White), "white");
}
