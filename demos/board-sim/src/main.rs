//! A simulated board plus a scripted two-player game against it.
//!
//! Starts a WebSocket endpoint that behaves like the physical board
//! (same wire protocol, same rules via the engine crate), points a
//! `BoardClient` at it, and plays a few turns end to end. Useful for
//! watching the full pipeline — supervisor, watchdog, reconciler,
//! orchestrator — under `RUST_LOG=debug`.

use std::collections::HashMap;
use std::time::Duration;

use droplink::engine::{self, START_TILE, STARTING_SCORE};
use droplink::prelude::*;
use droplink::protocol::{
    ChanceCardReport, Movement, RestoredScore, ScoreReport, TileReport, WireCodec,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,droplink=debug".into()),
        )
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(run_board(listener));

    let (client, mut notices) = BoardClient::builder().spawn(WsDialer, JsonCodec);
    client
        .connect(BoardAddr::new("DROP-SIM", addr.to_string()))
        .await?;
    client
        .set_roster(vec![
            PlayerSeat::new("Maya", "red"),
            PlayerSeat::new("Noor", "blue"),
        ])
        .await?;

    // Six scripted dice throws, alternating seats.
    let script: [u8; 6] = [4, 3, 6, 2, 5, 1];
    let mut turn = 0usize;

    while let Some(notice) = notices.recv().await {
        info!(?notice, "notice");
        match notice {
            BoardNotice::BoardConfigured => {
                client.submit_roll(PlayerId(0), script[0]).await?;
            }
            BoardNotice::CoinConfirmation { .. }
            | BoardNotice::PlacementTimeout { .. } => {
                turn += 1;
                if turn >= script.len() {
                    break;
                }
                let player = PlayerId((turn % 2) as u8);
                client.submit_roll(player, script[turn]).await?;
            }
            BoardNotice::WinnerDeclared(_) | BoardNotice::ConnectionExhausted => {
                break;
            }
            _ => {}
        }
    }

    client.shutdown().await?;
    info!("demo finished");
    Ok(())
}

// ---------------------------------------------------------------------------
// The board side
// ---------------------------------------------------------------------------

/// Accepts one controller and plays the board's role: applies the same
/// rules the engine defines and confirms each coin after a short pause.
async fn run_board(listener: TcpListener) {
    let Ok((stream, peer)) = listener.accept().await else {
        return;
    };
    debug!(%peer, "controller connected");
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    let codec = JsonCodec;

    let mut positions: HashMap<u8, (u8, i32)> = HashMap::new();

    while let Some(Ok(msg)) = source.next().await {
        let bytes = match msg {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.into(),
            Message::Close(_) => break,
            _ => continue,
        };
        let command: Command = match codec.decode(&bytes) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(error = %e, "board could not parse command");
                continue;
            }
        };

        let replies = handle_command(command, &mut positions);
        for (delay, event) in replies {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let bytes = codec.encode(&event).expect("events always encode");
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                return;
            }
        }
    }
    debug!("controller gone, board idle");
}

/// The board's reaction to one command: zero or more delayed events.
fn handle_command(
    command: Command,
    positions: &mut HashMap<u8, (u8, i32)>,
) -> Vec<(Duration, Event)> {
    match command {
        Command::Config { player_count, .. } => {
            positions.clear();
            for id in 0..player_count {
                positions.insert(id, (START_TILE, STARTING_SCORE));
            }
            vec![(Duration::ZERO, Event::ConfigComplete)]
        }

        Command::Roll {
            player_id,
            dice_value,
            current_tile,
            ..
        } => {
            let outcome = engine::resolve_turn(current_tile, dice_value);
            let card = outcome.draws_chance_card.then(|| {
                let card = engine::draw_chance_card();
                ChanceCardReport {
                    number: card.number,
                    description: card.description.to_string(),
                    effect: card.effect,
                }
            });
            let card_effect = card.as_ref().map(|c| c.effect).unwrap_or(0);

            let entry = positions
                .entry(player_id.0)
                .or_insert((START_TILE, STARTING_SCORE));
            let change = outcome.score_delta + card_effect;
            entry.0 = outcome.new_tile;
            entry.1 += change;
            let new_score = entry.1;

            vec![
                (
                    Duration::from_millis(100),
                    Event::RollProcessed {
                        player_id,
                        movement: Movement {
                            from: current_tile,
                            to: outcome.new_tile,
                        },
                        tile: TileReport {
                            name: outcome.tile.name.to_string(),
                            kind: outcome.tile.kind.wire_name().to_string(),
                        },
                        score: ScoreReport {
                            new: new_score,
                            change,
                        },
                        chance_card: card,
                    },
                ),
                // The "player" places the coin shortly after.
                (
                    Duration::from_millis(300),
                    Event::CoinPlaced {
                        player_id,
                        tile: outcome.new_tile,
                        verified: true,
                    },
                ),
            ]
        }

        Command::Undo {
            player_id,
            from_tile,
            to_tile,
        } => {
            let entry = positions
                .entry(player_id.0)
                .or_insert((START_TILE, STARTING_SCORE));
            entry.0 = to_tile;
            let restored = entry.1;
            vec![(
                Duration::from_millis(100),
                Event::UndoComplete {
                    player_id,
                    movement: Movement {
                        from: from_tile,
                        to: to_tile,
                    },
                    score: RestoredScore { restored },
                },
            )]
        }

        Command::Reset => {
            for entry in positions.values_mut() {
                *entry = (START_TILE, STARTING_SCORE);
            }
            vec![(
                Duration::ZERO,
                Event::Ready {
                    message: Some("board reset".into()),
                },
            )]
        }

        Command::UpdateSettings { nickname, .. } => vec![(
            Duration::ZERO,
            Event::SettingsUpdated {
                nickname,
                restart_required: false,
            },
        )],

        Command::Pair { .. } => vec![(
            Duration::ZERO,
            Event::Ready {
                message: Some("paired".into()),
            },
        )],
    }
}
