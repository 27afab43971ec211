//! End-to-end tests: a `BoardClient` talking to a scripted board over
//! the in-memory transport.

use std::time::Duration;

use droplink::prelude::*;
use droplink::GameError;
use droplink_session::{LinkState, SessionConfig};
use droplink_sync::SyncConfig;
use droplink_transport::memory::{self, BoardSimulator, SimSession};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

// =========================================================================
// Helpers
// =========================================================================

fn addr() -> BoardAddr {
    BoardAddr::new("SIM-BOARD", "loopback")
}

fn session_config() -> SessionConfig {
    SessionConfig {
        reconnect_delay: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_secs(30), // keep the watchdog out of these tests
        ..SessionConfig::default()
    }
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<BoardNotice>) -> BoardNotice {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notice should arrive in time")
        .expect("notice channel should stay open")
}

/// Drains notices until one matches; returns the skipped ones.
async fn wait_notice(
    rx: &mut mpsc::UnboundedReceiver<BoardNotice>,
    mut pred: impl FnMut(&BoardNotice) -> bool,
) -> (BoardNotice, Vec<BoardNotice>) {
    let mut skipped = Vec::new();
    loop {
        let notice = next_notice(rx).await;
        if pred(&notice) {
            return (notice, skipped);
        }
        skipped.push(notice);
    }
}

async fn recv_json(session: &mut SimSession) -> serde_json::Value {
    let bytes = timeout(Duration::from_secs(2), session.recv_command())
        .await
        .expect("command should arrive in time")
        .expect("session should stay open");
    serde_json::from_slice(&bytes).expect("commands are valid JSON")
}

async fn send_event(session: &SimSession, value: serde_json::Value) {
    assert!(
        session.send_event(value.to_string().into_bytes()).await,
        "event should be deliverable"
    );
}

/// Connects a client with a two-seat roster and walks the board through
/// configuration. Returns everything a scenario needs.
async fn game_table(
    sync: SyncConfig,
    undo_window: Duration,
) -> (
    BoardClient,
    mpsc::UnboundedReceiver<BoardNotice>,
    BoardSimulator,
    SimSession,
) {
    let (dialer, mut board) = memory::simulator();
    let (client, mut notices) = BoardClient::builder()
        .session_config(session_config())
        .sync_config(sync)
        .undo_window(undo_window)
        .spawn(dialer, JsonCodec);

    client.connect(addr()).await.unwrap();
    let mut session = board.accept().await.expect("board should see the dial");
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::LinkStateChanged(LinkState::Ready))
    })
    .await;

    client
        .set_roster(vec![
            PlayerSeat::new("Maya", "red"),
            PlayerSeat::new("Noor", "blue"),
        ])
        .await
        .unwrap();

    let config = recv_json(&mut session).await;
    assert_eq!(config["command"], "config");
    assert_eq!(config["playerCount"], 2);
    assert_eq!(config["colors"], json!(["FF0000", "0000FF"]));

    send_event(&session, json!({ "event": "config_complete" })).await;
    wait_notice(&mut notices, |n| matches!(n, BoardNotice::BoardConfigured)).await;

    (client, notices, board, session)
}

async fn default_table() -> (
    BoardClient,
    mpsc::UnboundedReceiver<BoardNotice>,
    BoardSimulator,
    SimSession,
) {
    game_table(SyncConfig::default(), Duration::from_secs(5)).await
}

/// Acknowledges the roll the board just received, echoing the expected
/// tile and the given score report.
async fn ack_roll(
    session: &mut SimSession,
    new_score: i32,
    change: i32,
) -> serde_json::Value {
    let roll = recv_json(session).await;
    assert_eq!(roll["command"], "roll");
    send_event(
        session,
        json!({
            "event": "roll_processed",
            "playerId": roll["playerId"],
            "movement": { "from": roll["currentTile"], "to": roll["expectedTile"] },
            "tile": { "name": "echo", "type": "NORMAL" },
            "score": { "new": new_score, "change": change }
        }),
    )
    .await;
    roll
}

// =========================================================================
// The happy path
// =========================================================================

#[tokio::test]
async fn test_full_turn_roll_ack_coin_advance() {
    let (client, mut notices, _board, mut session) = default_table().await;

    // Maya rolls a 4 from the start tile.
    client.submit_roll(PlayerId(0), 4).await.unwrap();

    let roll = recv_json(&mut session).await;
    assert_eq!(roll["command"], "roll");
    assert_eq!(roll["playerId"], 0);
    assert_eq!(roll["playerName"], "Maya");
    assert_eq!(roll["diceValue"], 4);
    assert_eq!(roll["currentTile"], 1);
    assert_eq!(roll["expectedTile"], 5); // Tree Cutting
    assert_eq!(roll["color"], "red");

    // The board processes it: tile 5 is a disaster, -3.
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 1, "to": 5 },
            "tile": { "name": "Tree Cutting", "type": "DISASTER" },
            "score": { "new": 7, "change": -3 }
        }),
    )
    .await;

    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::TurnResolved(_))
    })
    .await;
    let BoardNotice::TurnResolved(turn) = notice else {
        unreachable!()
    };
    assert_eq!(turn.player, PlayerId(0));
    assert_eq!(turn.from_tile, 1);
    assert_eq!(turn.to_tile, 5);
    assert_eq!(turn.score_delta, -3);
    assert_eq!(turn.score, 7);
    assert_eq!(turn.tile_name, "Tree Cutting");
    assert!(!turn.lap_completed);
    assert!(turn.chance_card.is_none());

    // A second roll while the coin is pending is rejected.
    let blocked = client.submit_roll(PlayerId(1), 3).await;
    assert!(matches!(
        blocked,
        Err(DroplinkError::Game(GameError::TurnInFlight))
    ));

    // Coin lands; the turn passes to Noor.
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 5, "verified": true }),
    )
    .await;
    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;
    assert_eq!(
        notice,
        BoardNotice::CoinConfirmation {
            tile: 5,
            verified: true
        }
    );

    client.submit_roll(PlayerId(1), 2).await.unwrap();
    let roll = recv_json(&mut session).await;
    assert_eq!(roll["playerId"], 1);
    assert_eq!(roll["playerName"], "Noor");
}

#[tokio::test]
async fn test_unverified_coin_is_nonfatal_warning() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 2).await.unwrap();
    ack_roll(&mut session, 11, 1).await;
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 3, "verified": false }),
    )
    .await;

    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;
    assert_eq!(
        notice,
        BoardNotice::CoinConfirmation {
            tile: 3,
            verified: false
        }
    );

    // The game still advanced.
    client.submit_roll(PlayerId(1), 1).await.unwrap();
}

#[tokio::test]
async fn test_coin_timeout_proceeds_to_next_player() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 6).await.unwrap();
    ack_roll(&mut session, 13, 3).await; // 1 + 6 = 7, Recycled Water

    // The board gives up on the coin; the game moves on anyway, with no
    // coin_placed event required.
    send_event(&session, json!({ "event": "coin_timeout", "tile": 7 })).await;
    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::PlacementTimeout { .. })
    })
    .await;
    assert_eq!(notice, BoardNotice::PlacementTimeout { tile: 7 });

    client.submit_roll(PlayerId(1), 3).await.unwrap();
    let roll = recv_json(&mut session).await;
    assert_eq!(roll["playerId"], 1);
}

#[tokio::test]
async fn test_misplacement_surfaces_errors_and_keeps_waiting() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 2).await.unwrap();
    ack_roll(&mut session, 11, 1).await;

    send_event(
        &session,
        json!({
            "event": "misplacement",
            "errors": [
                { "tile": 3, "issue": "unexpected coin" },
                { "tile": 7, "issue": "missing coin" }
            ]
        }),
    )
    .await;

    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::Misplacement { .. })
    })
    .await;
    let BoardNotice::Misplacement { errors } = notice else {
        unreachable!()
    };
    assert_eq!(errors.len(), 2);

    // No transition happened: the flow still waits for the coin.
    assert!(matches!(
        client.submit_roll(PlayerId(1), 3).await,
        Err(DroplinkError::Game(GameError::TurnInFlight))
    ));

    // Once corrected, the board re-announces and the game resumes.
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 3 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;
    client.submit_roll(PlayerId(1), 3).await.unwrap();
}

// =========================================================================
// Input validation
// =========================================================================

#[tokio::test]
async fn test_submit_roll_validation() {
    let (client, mut _notices, _board, mut _session) = default_table().await;

    // Out of turn: it is Maya's (P0) turn.
    assert!(matches!(
        client.submit_roll(PlayerId(1), 3).await,
        Err(DroplinkError::Game(GameError::OutOfTurn { .. }))
    ));

    // Dice out of range.
    assert!(matches!(
        client.submit_roll(PlayerId(0), 0).await,
        Err(DroplinkError::Game(GameError::InvalidDice(0)))
    ));
    assert!(matches!(
        client.submit_roll(PlayerId(0), 7).await,
        Err(DroplinkError::Game(GameError::InvalidDice(7)))
    ));

    // Unknown seat.
    assert!(matches!(
        client.submit_roll(PlayerId(9), 3).await,
        Err(DroplinkError::Game(GameError::UnknownPlayer(_)))
    ));
}

#[tokio::test]
async fn test_roll_without_roster_is_rejected() {
    let (dialer, mut board) = memory::simulator();
    let (client, mut notices) = BoardClient::builder()
        .session_config(session_config())
        .spawn(dialer, JsonCodec);

    client.connect(addr()).await.unwrap();
    let _session = board.accept().await.unwrap();
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::LinkStateChanged(LinkState::Ready))
    })
    .await;

    assert!(matches!(
        client.submit_roll(PlayerId(0), 3).await,
        Err(DroplinkError::Game(GameError::NoRoster))
    ));
}

// =========================================================================
// Undo
// =========================================================================

#[tokio::test]
async fn test_undo_restores_and_replays_the_turn() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 4).await.unwrap();
    ack_roll(&mut session, 7, -3).await; // 1 → 5
    wait_notice(&mut notices, |n| matches!(n, BoardNotice::TurnResolved(_))).await;

    client.request_undo().await.unwrap();
    let undo = recv_json(&mut session).await;
    assert_eq!(undo["command"], "undo");
    assert_eq!(undo["playerId"], 0);
    assert_eq!(undo["fromTile"], 5);
    assert_eq!(undo["toTile"], 1);

    send_event(
        &session,
        json!({
            "event": "undo_complete",
            "playerId": 0,
            "movement": { "from": 5, "to": 1 },
            "score": { "restored": 10 }
        }),
    )
    .await;
    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::UndoApplied { .. })
    })
    .await;
    assert_eq!(
        notice,
        BoardNotice::UndoApplied {
            player: PlayerId(0),
            restored_tile: 1,
            restored_score: 10
        }
    );

    // The board re-confirms the coin back on tile 1; the turn stays
    // with Maya, who rolls again from the restored position.
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 1 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;

    client.submit_roll(PlayerId(0), 2).await.unwrap();
    let roll = recv_json(&mut session).await;
    assert_eq!(roll["playerId"], 0);
    assert_eq!(roll["currentTile"], 1, "position was restored");
}

#[tokio::test]
async fn test_undo_after_window_expiry_is_rejected_without_commands() {
    let (client, mut notices, _board, mut session) =
        game_table(SyncConfig::default(), Duration::from_millis(80)).await;

    client.submit_roll(PlayerId(0), 4).await.unwrap();
    ack_roll(&mut session, 7, -3).await;
    wait_notice(&mut notices, |n| matches!(n, BoardNotice::TurnResolved(_))).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(matches!(
        client.request_undo().await,
        Err(DroplinkError::Game(GameError::UndoExpired))
    ));
    // The lapsed window is gone for good (until the next roll).
    assert!(matches!(
        client.request_undo().await,
        Err(DroplinkError::Game(GameError::UndoUnavailable))
    ));

    // No undo command ever reached the board.
    assert!(
        timeout(Duration::from_millis(100), session.recv_command())
            .await
            .is_err(),
        "no command should have been sent"
    );

    // And the flow continues as if nothing happened: coin placement,
    // then the next player rolls from an unmutated position.
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 5 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;
    client.submit_roll(PlayerId(1), 3).await.unwrap();
}

#[tokio::test]
async fn test_undo_without_any_roll_is_unavailable() {
    let (client, _notices, _board, _session) = default_table().await;

    assert!(matches!(
        client.request_undo().await,
        Err(DroplinkError::Game(GameError::UndoUnavailable))
    ));
}

#[tokio::test]
async fn test_second_roll_overwrites_the_undo_slot() {
    let (client, mut notices, _board, mut session) = default_table().await;

    // Maya's turn completes fully.
    client.submit_roll(PlayerId(0), 4).await.unwrap();
    ack_roll(&mut session, 7, -3).await;
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 5 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;

    // Noor rolls; the new window replaces Maya's silently.
    client.submit_roll(PlayerId(1), 2).await.unwrap();
    ack_roll(&mut session, 11, 1).await;
    wait_notice(&mut notices, |n| {
        matches!(
            n,
            BoardNotice::TurnResolved(TurnSummary {
                player: PlayerId(1),
                ..
            })
        )
    })
    .await;

    // The undo that goes out now reverts Noor's move, not Maya's.
    client.request_undo().await.unwrap();
    let undo = recv_json(&mut session).await;
    assert_eq!(undo["playerId"], 1);
    assert_eq!(undo["toTile"], 1);
}

// =========================================================================
// Malformed events
// =========================================================================

#[tokio::test]
async fn test_malformed_events_cause_zero_transitions() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 4).await.unwrap();
    let _roll = recv_json(&mut session).await;

    // Garbage, an event with no discriminator, and an ack missing its
    // score: all dropped before the orchestrator sees them.
    session.send_event(b"not json".to_vec()).await;
    send_event(&session, json!({ "playerId": 0, "tile": 5 })).await;
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 1, "to": 5 },
            "tile": { "name": "Tree Cutting", "type": "DISASTER" }
        }),
    )
    .await;

    // Still awaiting the ack: another roll is still in flight...
    assert!(matches!(
        client.submit_roll(PlayerId(1), 3).await,
        Err(DroplinkError::Game(GameError::TurnInFlight))
    ));

    // ...and the eventual well-formed ack resolves the original roll.
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 1, "to": 5 },
            "tile": { "name": "Tree Cutting", "type": "DISASTER" },
            "score": { "new": 7, "change": -3 }
        }),
    )
    .await;
    let (notice, skipped) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::TurnResolved(_))
    })
    .await;
    assert!(
        skipped.is_empty(),
        "malformed events produced notices: {skipped:?}"
    );
    let BoardNotice::TurnResolved(turn) = notice else {
        unreachable!()
    };
    assert_eq!(turn.to_tile, 5);
}

// =========================================================================
// Elimination and winner
// =========================================================================

#[tokio::test]
async fn test_elimination_skips_the_seat_and_winner_ends_the_game() {
    let (client, mut notices, _board, mut session) = default_table().await;

    send_event(&session, json!({ "event": "player_eliminated", "playerId": 1 }))
        .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::PlayerEliminated(PlayerId(1)))
    })
    .await;

    // Maya completes a turn; with Noor eliminated the turn returns to
    // Maya.
    client.submit_roll(PlayerId(0), 2).await.unwrap();
    ack_roll(&mut session, 11, 1).await;
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 3 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;

    client.submit_roll(PlayerId(0), 1).await.unwrap();
    let roll = recv_json(&mut session).await;
    assert_eq!(roll["playerId"], 0, "eliminated seat is skipped");

    // An eliminated player can't roll.
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 3, "to": 4 },
            "tile": { "name": "Flower Garden", "type": "BONUS" },
            "score": { "new": 12, "change": 1 }
        }),
    )
    .await;
    send_event(
        &session,
        json!({ "event": "coin_placed", "playerId": 0, "tile": 4 }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::CoinConfirmation { .. })
    })
    .await;
    assert!(matches!(
        client.submit_roll(PlayerId(1), 3).await,
        Err(DroplinkError::Game(GameError::Eliminated(PlayerId(1))))
            | Err(DroplinkError::Game(GameError::OutOfTurn { .. }))
    ));

    send_event(&session, json!({ "event": "winner_declared", "winnerId": 0 }))
        .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::WinnerDeclared(PlayerId(0)))
    })
    .await;
}

#[tokio::test]
async fn test_local_score_running_dry_retires_the_seat() {
    let (client, mut notices, _board, mut session) = default_table().await;

    // Plays one full turn: roll, board ack, coin placed, confirmation.
    async fn complete_turn(
        client: &BoardClient,
        notices: &mut mpsc::UnboundedReceiver<BoardNotice>,
        session: &mut SimSession,
        player: PlayerId,
        dice: u8,
    ) {
        client.submit_roll(player, dice).await.unwrap();
        let roll = ack_roll(session, 0, 0).await;
        send_event(
            session,
            json!({
                "event": "coin_placed",
                "playerId": player.0,
                "tile": roll["expectedTile"]
            }),
        )
        .await;
        wait_notice(notices, |n| {
            matches!(n, BoardNotice::CoinConfirmation { .. })
        })
        .await;
    }

    // Maya's rolls walk her score down by the rules: 10 → 7 (Tree
    // Cutting) → 2 (River Robber) → −2 (Shrinking Lake). The board
    // never sends a player_eliminated event.
    complete_turn(&client, &mut notices, &mut session, PlayerId(0), 4).await;
    complete_turn(&client, &mut notices, &mut session, PlayerId(1), 1).await;
    complete_turn(&client, &mut notices, &mut session, PlayerId(0), 4).await;
    complete_turn(&client, &mut notices, &mut session, PlayerId(1), 1).await;
    complete_turn(&client, &mut notices, &mut session, PlayerId(0), 3).await;

    // Noor plays; afterwards the rotation skips the dried-up seat and
    // comes straight back to her.
    complete_turn(&client, &mut notices, &mut session, PlayerId(1), 1).await;

    assert!(matches!(
        client.submit_roll(PlayerId(0), 2).await,
        Err(DroplinkError::Game(GameError::Eliminated(PlayerId(0))))
    ));
    client.submit_roll(PlayerId(1), 2).await.unwrap();
}

// =========================================================================
// Link loss during a game
// =========================================================================

#[tokio::test]
async fn test_link_loss_voids_pending_roll_and_reconfig_on_reconnect() {
    let (client, mut notices, mut board, mut session) = default_table().await;

    client.submit_roll(PlayerId(0), 4).await.unwrap();
    let _roll = recv_json(&mut session).await;

    drop(session); // the board vanishes mid-ack

    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::ConnectionLost { .. })
    })
    .await;
    assert_eq!(
        notice,
        BoardNotice::ConnectionLost {
            cause: DisconnectCause::Organic
        }
    );

    // The game is active, so the supervisor redials; on link-up the
    // orchestrator re-pushes the configuration.
    let mut session2 = timeout(Duration::from_secs(2), board.accept())
        .await
        .expect("reconnect dial expected")
        .unwrap();
    let config = recv_json(&mut session2).await;
    assert_eq!(config["command"], "config");
    send_event(&session2, json!({ "event": "config_complete" })).await;

    // The in-flight roll was voided; the game resumes from Idle.
    client.submit_roll(PlayerId(0), 4).await.unwrap();
    let roll = recv_json(&mut session2).await;
    assert_eq!(roll["command"], "roll");
    assert_eq!(roll["currentTile"], 1, "the voided roll never landed");
}

// =========================================================================
// Reconciliation
// =========================================================================

#[tokio::test]
async fn test_persistent_divergence_raises_once_and_trust_remote_clears() {
    let sync = SyncConfig {
        interval: Duration::from_millis(25),
        failure_threshold: 3,
        quiet_warning: Duration::from_secs(30),
    };
    let (client, mut notices, _board, mut session) =
        game_table(sync, Duration::from_secs(5)).await;

    // The board acks the roll but reports a different score than the
    // rules produce (local: 10 - 3 = 7; board claims 9).
    client.submit_roll(PlayerId(0), 4).await.unwrap();
    let _roll = recv_json(&mut session).await;
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 1, "to": 5 },
            "tile": { "name": "Tree Cutting", "type": "DISASTER" },
            "score": { "new": 9, "change": -1 }
        }),
    )
    .await;
    wait_notice(&mut notices, |n| matches!(n, BoardNotice::TurnResolved(_))).await;

    // Three checks at 25 ms intervals cross the threshold.
    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::ReconciliationFailure { .. })
    })
    .await;
    let BoardNotice::ReconciliationFailure { message } = notice else {
        unreachable!()
    };
    assert!(message.contains("consecutive sync failures"));

    // Trust the board: the local mirror is dropped and rebuilt from
    // events, so the divergence is gone and no second failure fires.
    client
        .resolve_reconciliation(Resolution::TrustRemote)
        .await
        .unwrap();

    let quiet = timeout(Duration::from_millis(300), async {
        loop {
            if let Some(BoardNotice::ReconciliationFailure { .. }) =
                notices.recv().await
            {
                return;
            }
        }
    })
    .await;
    assert!(
        quiet.is_err(),
        "no further failures after trusting the board"
    );
}

#[tokio::test]
async fn test_trust_local_repushes_configuration() {
    let sync = SyncConfig {
        interval: Duration::from_millis(25),
        failure_threshold: 3,
        quiet_warning: Duration::from_secs(30),
    };
    let (client, mut notices, _board, mut session) =
        game_table(sync, Duration::from_secs(5)).await;

    client.submit_roll(PlayerId(0), 4).await.unwrap();
    let _roll = recv_json(&mut session).await;
    send_event(
        &session,
        json!({
            "event": "roll_processed",
            "playerId": 0,
            "movement": { "from": 1, "to": 6 },
            "tile": { "name": "Marsh Swamp", "type": "CHANCE" },
            "score": { "new": 10, "change": 0 }
        }),
    )
    .await;
    wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::ReconciliationFailure { .. })
    })
    .await;

    client
        .resolve_reconciliation(Resolution::TrustLocal)
        .await
        .unwrap();

    // Trusting local means the board is told to adopt our state via a
    // fresh configuration push.
    let config = recv_json(&mut session).await;
    assert_eq!(config["command"], "config");
}

// =========================================================================
// Reset and settings
// =========================================================================

#[tokio::test]
async fn test_reset_returns_everyone_to_start() {
    let (client, mut notices, _board, mut session) = default_table().await;

    // Play half a turn, then reset mid-flow.
    client.submit_roll(PlayerId(0), 4).await.unwrap();
    ack_roll(&mut session, 7, -3).await;
    wait_notice(&mut notices, |n| matches!(n, BoardNotice::TurnResolved(_))).await;

    client.request_reset().await.unwrap();
    let reset = recv_json(&mut session).await;
    assert_eq!(reset, json!({ "command": "reset" }));

    // Fresh game: Maya rolls again from tile 1.
    client.submit_roll(PlayerId(0), 3).await.unwrap();
    let roll = recv_json(&mut session).await;
    assert_eq!(roll["currentTile"], 1);
    assert_eq!(roll["expectedTile"], 4);
}

#[tokio::test]
async fn test_pair_sends_the_password() {
    let (client, _notices, _board, mut session) = default_table().await;

    client.pair("123456").await.unwrap();

    let cmd = recv_json(&mut session).await;
    assert_eq!(cmd["command"], "pair");
    assert_eq!(cmd["password"], "123456");
}

#[tokio::test]
async fn test_update_settings_round_trip() {
    let (client, mut notices, _board, mut session) = default_table().await;

    client
        .update_board_settings(Some("Kitchen board".into()), None)
        .await
        .unwrap();

    let cmd = recv_json(&mut session).await;
    assert_eq!(cmd["command"], "update_settings");
    assert_eq!(cmd["nickname"], "Kitchen board");
    assert!(cmd.get("password").is_none());

    send_event(
        &session,
        json!({
            "event": "settings_updated",
            "nickname": "Kitchen board",
            "restartRequired": false
        }),
    )
    .await;
    let (notice, _) = wait_notice(&mut notices, |n| {
        matches!(n, BoardNotice::SettingsUpdated { .. })
    })
    .await;
    assert_eq!(
        notice,
        BoardNotice::SettingsUpdated {
            nickname: Some("Kitchen board".into()),
            restart_required: false
        }
    );
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_tears_everything_down() {
    let (client, _notices, _board, mut session) = default_table().await;

    client.shutdown().await.unwrap();

    // The board sees the link close...
    assert!(
        timeout(Duration::from_secs(1), session.recv_command())
            .await
            .expect("close should be prompt")
            .is_none()
    );
    // ...and later calls fail cleanly instead of hanging.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.submit_roll(PlayerId(0), 3).await.is_err());
}
