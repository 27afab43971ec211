//! The board orchestrator: ties rolls, board confirmations, and turn
//! advancement together.
//!
//! One actor task owns the whole game flow. Per roll, the state machine
//! is:
//!
//! ```text
//! Idle ──submit_roll──→ AwaitingBoardRollAck ──roll_processed──→
//!     AwaitingCoinPlacement ──coin_placed / coin_timeout──→ Idle(next)
//! ```
//!
//! `misplacement` never transitions (the board re-announces once the
//! coins are fixed), and a confirmed undo jumps back to
//! `AwaitingCoinPlacement` for the restored tile.
//!
//! Ownership: this task is the only writer of the local state mirror
//! and the board-reported copy; the reconciler reads both. The local
//! mirror is updated from the *locally computed* turn outcome when the
//! board acks a roll — the board's reported values go into the reported
//! copy, which is exactly what lets the reconciler notice divergence.

use std::collections::HashSet;
use std::time::Duration;

use droplink_engine::{is_eliminated, resolve_turn, START_TILE, STARTING_SCORE};
use droplink_protocol::{Command, Event, PlayerId};
use droplink_session::{LinkSignal, LinkSupervisorHandle, SessionError};
use droplink_sync::{
    spawn_reconciler, ReconcileSignal, ReconcilerHandle, Resolution,
    SharedMirror, SharedReported, SyncConfig,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{BoardNotice, DroplinkError, PlayerSeat, TurnSummary};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the current roll stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for the next roll.
    Idle,
    /// A roll command is out; the board hasn't acked it yet.
    AwaitingBoardRollAck,
    /// The board processed the roll and waits for the physical coin.
    AwaitingCoinPlacement,
}

/// Game-flow errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("no roster configured")]
    NoRoster,

    #[error("roster supports at most {max} players, got {got}")]
    RosterTooLarge { max: usize, got: usize },

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("player {0} is eliminated")]
    Eliminated(PlayerId),

    #[error("it is {expected}'s turn")]
    OutOfTurn { expected: PlayerId },

    #[error("dice value {0} is out of range")]
    InvalidDice(u8),

    #[error("a turn is already in flight")]
    TurnInFlight,

    #[error("nothing to undo")]
    UndoUnavailable,

    #[error("the undo window has expired")]
    UndoExpired,
}

/// Most players a board supports.
pub(crate) const MAX_PLAYERS: usize = 4;

/// Valid dice values.
const DICE_RANGE: std::ops::RangeInclusive<u8> = 1..=6;

// ---------------------------------------------------------------------------
// Actor plumbing
// ---------------------------------------------------------------------------

type Reply = oneshot::Sender<Result<(), DroplinkError>>;

pub(crate) enum ClientCommand {
    Connect {
        target: droplink_transport::BoardAddr,
        reply: Reply,
    },
    Disconnect {
        reply: Reply,
    },
    Pair {
        password: String,
        reply: Reply,
    },
    SetRoster {
        seats: Vec<PlayerSeat>,
        reply: Reply,
    },
    SubmitRoll {
        player: PlayerId,
        dice: u8,
        reply: Reply,
    },
    RequestUndo {
        reply: Reply,
    },
    RequestReset {
        reply: Reply,
    },
    UpdateSettings {
        nickname: Option<String>,
        password: Option<String>,
        reply: Reply,
    },
    Resolve {
        resolution: Resolution,
        reply: Reply,
    },
    Shutdown {
        reply: Reply,
    },
}

pub(crate) struct OrchestratorConfig {
    pub undo_window: Duration,
    pub sync: SyncConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            undo_window: Duration::from_secs(5),
            sync: SyncConfig::default(),
        }
    }
}

/// Spawns the orchestrator task.
pub(crate) fn spawn_orchestrator(
    supervisor: LinkSupervisorHandle,
    signals: mpsc::Receiver<LinkSignal>,
    config: OrchestratorConfig,
) -> (
    mpsc::Sender<ClientCommand>,
    mpsc::UnboundedReceiver<BoardNotice>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (reconcile_tx, reconcile_rx) = mpsc::channel(4);

    let orchestrator = Orchestrator {
        supervisor,
        signals,
        commands: cmd_rx,
        notices: notice_tx,
        reconcile_tx,
        reconcile_rx,
        reconciler: None,
        local: SharedMirror::default(),
        reported: SharedReported::default(),
        seats: Vec::new(),
        eliminated: HashSet::new(),
        current_player: 0,
        phase: TurnPhase::Idle,
        advance_after_placement: true,
        pending_roll: None,
        undo_window: None,
        config,
        game_active: false,
    };
    tokio::spawn(orchestrator.run());

    (cmd_tx, notice_rx)
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// The roll that is currently out with the board.
struct PendingRoll {
    player: PlayerId,
    from_tile: u8,
    outcome: droplink_engine::TurnOutcome,
}

/// The one-slot permission to reverse the latest move. A new roll
/// silently overwrites it; expiry is checked when an undo is requested.
struct UndoWindow {
    player: PlayerId,
    previous_position: u8,
    previous_score: i32,
    expires_at: Instant,
}

impl UndoWindow {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

enum Step {
    Command(Option<ClientCommand>),
    Signal(Option<LinkSignal>),
    Reconcile(Option<ReconcileSignal>),
}

struct Orchestrator {
    supervisor: LinkSupervisorHandle,
    signals: mpsc::Receiver<LinkSignal>,
    commands: mpsc::Receiver<ClientCommand>,
    notices: mpsc::UnboundedSender<BoardNotice>,
    reconcile_tx: mpsc::Sender<ReconcileSignal>,
    reconcile_rx: mpsc::Receiver<ReconcileSignal>,
    reconciler: Option<ReconcilerHandle>,

    /// The controller's belief of the truth. This task is the only
    /// writer.
    local: SharedMirror,
    /// What the board last reported. This task is the only writer.
    reported: SharedReported,

    seats: Vec<PlayerSeat>,
    eliminated: HashSet<PlayerId>,
    /// Index into `seats`.
    current_player: u8,
    phase: TurnPhase,
    /// Whether the next coin confirmation hands the turn to the next
    /// player. False after an undo: the reverted player goes again.
    advance_after_placement: bool,
    pending_roll: Option<PendingRoll>,
    undo_window: Option<UndoWindow>,

    config: OrchestratorConfig,
    game_active: bool,
}

impl Orchestrator {
    async fn run(mut self) {
        debug!("board orchestrator started");

        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Command(cmd),
                signal = self.signals.recv() => Step::Signal(signal),
                signal = self.reconcile_rx.recv() => Step::Reconcile(signal),
            };

            match step {
                Step::Command(None) => break,
                Step::Command(Some(cmd)) => {
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
                Step::Signal(None) => break, // supervisor gone
                Step::Signal(Some(signal)) => self.handle_signal(signal).await,
                Step::Reconcile(None) => break,
                Step::Reconcile(Some(ReconcileSignal::Failure { message })) => {
                    warn!(%message, "reconciliation failure raised");
                    self.notify(BoardNotice::ReconciliationFailure { message });
                }
            }
        }

        debug!("board orchestrator stopped");
    }

    // -- caller commands ---------------------------------------------------

    /// Returns `true` when the actor should stop.
    async fn handle_command(&mut self, cmd: ClientCommand) -> bool {
        match cmd {
            ClientCommand::Connect { target, reply } => {
                let result = self.supervisor.connect(target).await;
                let _ = reply.send(result.map_err(Into::into));
            }

            ClientCommand::Disconnect { reply } => {
                self.end_game().await;
                // Dropping the ack wait keeps a half-finished roll from
                // wedging the flow once the board is gone.
                self.phase = TurnPhase::Idle;
                self.pending_roll = None;
                let result = self.supervisor.disconnect().await;
                let _ = reply.send(result.map_err(Into::into));
            }

            ClientCommand::Pair { password, reply } => {
                let result = self
                    .supervisor
                    .send_command(Command::Pair { password })
                    .await;
                let _ = reply.send(result.map_err(Into::into));
            }

            ClientCommand::SetRoster { seats, reply } => {
                let _ = reply.send(self.set_roster(seats).await);
            }

            ClientCommand::SubmitRoll {
                player,
                dice,
                reply,
            } => {
                let _ = reply.send(self.submit_roll(player, dice).await);
            }

            ClientCommand::RequestUndo { reply } => {
                let _ = reply.send(self.request_undo().await);
            }

            ClientCommand::RequestReset { reply } => {
                let _ = reply.send(self.request_reset().await);
            }

            ClientCommand::UpdateSettings {
                nickname,
                password,
                reply,
            } => {
                let result = self
                    .supervisor
                    .send_command(Command::UpdateSettings { nickname, password })
                    .await;
                let _ = reply.send(result.map_err(Into::into));
            }

            ClientCommand::Resolve { resolution, reply } => {
                let _ = reply.send(self.resolve(resolution).await);
            }

            ClientCommand::Shutdown { reply } => {
                // Teardown order: reconciler first, then the supervisor
                // (which cancels its own delays and watchdog before the
                // transport goes down).
                self.reconciler = None;
                let _ = self.supervisor.shutdown().await;
                let _ = reply.send(Ok(()));
                return true;
            }
        }
        false
    }

    async fn set_roster(&mut self, seats: Vec<PlayerSeat>) -> Result<(), DroplinkError> {
        if seats.is_empty() {
            return Err(GameError::NoRoster.into());
        }
        if seats.len() > MAX_PLAYERS {
            return Err(GameError::RosterTooLarge {
                max: MAX_PLAYERS,
                got: seats.len(),
            }
            .into());
        }

        info!(players = seats.len(), "roster configured");
        self.seats = seats;
        self.reset_game_state();

        if self.supervisor.is_ready() {
            self.push_config().await?;
        }
        Ok(())
    }

    async fn submit_roll(
        &mut self,
        player: PlayerId,
        dice: u8,
    ) -> Result<(), DroplinkError> {
        if self.seats.is_empty() {
            return Err(GameError::NoRoster.into());
        }
        if !DICE_RANGE.contains(&dice) {
            return Err(GameError::InvalidDice(dice).into());
        }
        if self.phase != TurnPhase::Idle {
            return Err(GameError::TurnInFlight.into());
        }
        let seat = self
            .seats
            .get(player.0 as usize)
            .ok_or(GameError::UnknownPlayer(player))?;
        if self.eliminated.contains(&player) {
            return Err(GameError::Eliminated(player).into());
        }
        let expected = PlayerId(self.current_player);
        if player != expected {
            return Err(GameError::OutOfTurn { expected }.into());
        }

        let from = self
            .local
            .read()
            .expect("mirror lock poisoned")
            .get(player)
            .ok_or(GameError::UnknownPlayer(player))?;

        let outcome = resolve_turn(from.position, dice);
        debug!(
            %player,
            dice,
            from_tile = from.position,
            expected_tile = outcome.new_tile,
            "roll submitted"
        );

        self.supervisor
            .send_command(Command::Roll {
                player_id: player,
                player_name: seat.name.clone(),
                dice_value: dice,
                current_tile: from.position,
                expected_tile: outcome.new_tile,
                color: seat.color.clone(),
            })
            .await?;

        self.pending_roll = Some(PendingRoll {
            player,
            from_tile: from.position,
            outcome,
        });
        self.phase = TurnPhase::AwaitingBoardRollAck;
        Ok(())
    }

    async fn request_undo(&mut self) -> Result<(), DroplinkError> {
        let window = self.undo_window.as_ref().ok_or(GameError::UndoUnavailable)?;
        if window.is_expired() {
            // Lapsed: gone until the next roll opens a new window.
            self.undo_window = None;
            return Err(GameError::UndoExpired.into());
        }

        let player = window.player;
        let to_tile = window.previous_position;
        let from_tile = self
            .local
            .read()
            .expect("mirror lock poisoned")
            .get(player)
            .map(|s| s.position)
            .unwrap_or(to_tile);

        // Nothing is mutated until the board confirms with
        // `undo_complete`.
        self.supervisor
            .send_command(Command::Undo {
                player_id: player,
                from_tile,
                to_tile,
            })
            .await?;
        debug!(%player, from_tile, to_tile, "undo requested");
        Ok(())
    }

    async fn request_reset(&mut self) -> Result<(), DroplinkError> {
        // Best effort toward the board; the local game resets either
        // way so an offline game can start over too.
        match self.supervisor.send_command(Command::Reset).await {
            Ok(()) => {}
            Err(SessionError::NotReady) => {
                debug!("reset while link down; local state only")
            }
            Err(e) => return Err(e.into()),
        }
        self.reset_game_state();
        info!("game reset");
        Ok(())
    }

    async fn resolve(&mut self, resolution: Resolution) -> Result<(), DroplinkError> {
        match resolution {
            Resolution::TrustLocal => {
                info!("reconciliation: trusting local state");
                // The mirror stays; the board is told to adopt it by
                // re-running its configuration.
                if self.supervisor.is_ready() {
                    self.push_config().await?;
                }
            }
            Resolution::TrustRemote => {
                info!("reconciliation: trusting board state");
                self.local.write().expect("mirror lock poisoned").clear();
                self.reported
                    .write()
                    .expect("reported lock poisoned")
                    .clear();
                // The mirror rebuilds from the next board-reported
                // events.
            }
        }
        if let Some(reconciler) = &self.reconciler {
            reconciler.reset_failures();
        }
        Ok(())
    }

    // -- link signals ------------------------------------------------------

    async fn handle_signal(&mut self, signal: LinkSignal) {
        match signal {
            LinkSignal::StateChanged(state) => {
                self.notify(BoardNotice::LinkStateChanged(state));
            }

            LinkSignal::Up => {
                // A (re)connected board needs its configuration before
                // it can follow the game.
                if !self.seats.is_empty() {
                    if let Err(e) = self.push_config().await {
                        warn!(error = %e, "config push after link-up failed");
                    }
                }
            }

            LinkSignal::Lost { cause } => {
                // A roll that was out with the board is void; the game
                // resumes from Idle once the link is back.
                self.pending_roll = None;
                self.phase = TurnPhase::Idle;
                self.notify(BoardNotice::ConnectionLost { cause });
            }

            LinkSignal::Exhausted => {
                self.notify(BoardNotice::ConnectionExhausted);
            }

            LinkSignal::Event(event) => self.handle_event(event).await,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Ready { message } => {
                debug!(message = message.as_deref().unwrap_or(""), "board ready");
            }

            Event::ConfigComplete => {
                info!("board configured");
                self.start_game().await;
                self.notify(BoardNotice::BoardConfigured);
            }

            Event::RollProcessed {
                player_id,
                movement,
                tile,
                score,
                chance_card,
            } => {
                // The reported copy always tracks what the board said.
                self.reported
                    .write()
                    .expect("reported lock poisoned")
                    .record(player_id, movement.to, score.new);

                let pending = match self.pending_roll.take() {
                    Some(p)
                        if self.phase == TurnPhase::AwaitingBoardRollAck
                            && p.player == player_id =>
                    {
                        p
                    }
                    other => {
                        warn!(
                            %player_id,
                            tile = movement.to,
                            "unsolicited roll_processed, no transition"
                        );
                        self.pending_roll = other;
                        return;
                    }
                };

                if movement.to != pending.outcome.new_tile {
                    warn!(
                        %player_id,
                        ours = pending.outcome.new_tile,
                        board = movement.to,
                        "board disagrees on the landing tile"
                    );
                }
                let _ = tile; // the engine's own descriptor is richer

                // Local belief: the locally computed outcome, plus the
                // card effect the board reported (the draw is the one
                // thing the engine leaves open).
                let card_effect =
                    chance_card.as_ref().map(|c| c.effect).unwrap_or(0);
                let previous = {
                    let mirror = self.local.read().expect("mirror lock poisoned");
                    mirror.get(player_id)
                };
                let previous = previous.unwrap_or(droplink_sync::PlayerState {
                    position: pending.from_tile,
                    score: STARTING_SCORE,
                });
                let delta = pending.outcome.score_delta + card_effect;
                let new_score = previous.score + delta;

                self.local
                    .write()
                    .expect("mirror lock poisoned")
                    .record(player_id, pending.outcome.new_tile, new_score);

                // Elimination is a rule, not just a board report: a seat
                // whose local score ran dry stops getting turns even if
                // the board never retires it (the reconciler flags the
                // score divergence; the board's own event is still what
                // reaches the UI).
                if is_eliminated(new_score) && self.eliminated.insert(player_id) {
                    warn!(%player_id, score = new_score, "score ran dry, seat retired locally");
                }

                // A completed roll opens (and silently overwrites) the
                // one undo slot.
                self.undo_window = Some(UndoWindow {
                    player: player_id,
                    previous_position: previous.position,
                    previous_score: previous.score,
                    expires_at: Instant::now() + self.config.undo_window,
                });

                self.phase = TurnPhase::AwaitingCoinPlacement;
                self.advance_after_placement = true;
                info!(
                    %player_id,
                    from = pending.from_tile,
                    to = pending.outcome.new_tile,
                    delta,
                    score = new_score,
                    "turn resolved"
                );
                self.notify(BoardNotice::TurnResolved(TurnSummary {
                    player: player_id,
                    from_tile: pending.from_tile,
                    to_tile: pending.outcome.new_tile,
                    score_delta: delta,
                    score: new_score,
                    tile_name: pending.outcome.tile.name,
                    tile_kind: pending.outcome.tile.kind,
                    lap_completed: pending.outcome.lap_completed,
                    chance_card,
                }));
            }

            Event::CoinPlaced {
                player_id,
                tile,
                verified,
            } => {
                if self.phase != TurnPhase::AwaitingCoinPlacement {
                    debug!(%player_id, tile, "coin report outside placement wait");
                    return;
                }
                if !verified {
                    warn!(%player_id, tile, "unverified coin placement");
                }
                self.phase = TurnPhase::Idle;
                if self.advance_after_placement {
                    self.advance_player();
                }
                self.advance_after_placement = true;
                self.notify(BoardNotice::CoinConfirmation { tile, verified });
            }

            Event::CoinTimeout { tile } => {
                if self.phase != TurnPhase::AwaitingCoinPlacement {
                    debug!(tile, "coin timeout outside placement wait");
                    return;
                }
                // Deliberate: a missed physical placement never blocks
                // the game.
                warn!(tile, "coin placement timed out, continuing");
                self.phase = TurnPhase::Idle;
                if self.advance_after_placement {
                    self.advance_player();
                }
                self.advance_after_placement = true;
                self.notify(BoardNotice::PlacementTimeout { tile });
            }

            Event::Misplacement { errors } => {
                // Stay in the current phase — the board re-announces
                // once the layout is corrected.
                warn!(count = errors.len(), "coin misplacement reported");
                self.notify(BoardNotice::Misplacement { errors });
            }

            Event::UndoComplete {
                player_id,
                movement,
                score,
            } => {
                self.reported
                    .write()
                    .expect("reported lock poisoned")
                    .record(player_id, movement.to, score.restored);

                let Some(window) = self.undo_window.take() else {
                    warn!(%player_id, "unsolicited undo_complete, no transition");
                    return;
                };

                self.local.write().expect("mirror lock poisoned").record(
                    window.player,
                    window.previous_position,
                    window.previous_score,
                );
                // Undoing the roll also undoes an elimination it caused.
                if !is_eliminated(window.previous_score) {
                    self.eliminated.remove(&window.player);
                }
                // The reverted player goes again, and the board expects
                // the coin back on the old tile.
                self.current_player = window.player.0;
                self.pending_roll = None;
                self.phase = TurnPhase::AwaitingCoinPlacement;
                self.advance_after_placement = false;
                info!(
                    player = %window.player,
                    tile = window.previous_position,
                    score = window.previous_score,
                    "undo applied"
                );
                self.notify(BoardNotice::UndoApplied {
                    player: window.player,
                    restored_tile: window.previous_position,
                    restored_score: window.previous_score,
                });
            }

            Event::SettingsUpdated {
                nickname,
                restart_required,
            } => {
                self.notify(BoardNotice::SettingsUpdated {
                    nickname,
                    restart_required,
                });
            }

            Event::PlayerEliminated { player_id } => {
                info!(%player_id, "player eliminated");
                self.eliminated.insert(player_id);
                self.notify(BoardNotice::PlayerEliminated(player_id));
            }

            Event::WinnerDeclared { winner_id } => {
                info!(%winner_id, "winner declared");
                self.end_game().await;
                self.phase = TurnPhase::Idle;
                self.pending_roll = None;
                self.undo_window = None;
                self.notify(BoardNotice::WinnerDeclared(winner_id));
            }
        }
    }

    // -- helpers -----------------------------------------------------------

    async fn push_config(&self) -> Result<(), SessionError> {
        self.supervisor
            .send_command(Command::Config {
                player_count: self.seats.len() as u8,
                colors: self
                    .seats
                    .iter()
                    .map(|seat| seat.color_hex().to_string())
                    .collect(),
            })
            .await
    }

    /// Puts every seat back on the start tile with the starting score.
    fn reset_game_state(&mut self) {
        {
            let mut mirror = self.local.write().expect("mirror lock poisoned");
            mirror.clear();
            for index in 0..self.seats.len() {
                mirror.record(PlayerId(index as u8), START_TILE, STARTING_SCORE);
            }
        }
        self.reported
            .write()
            .expect("reported lock poisoned")
            .clear();
        self.eliminated.clear();
        self.current_player = 0;
        self.phase = TurnPhase::Idle;
        self.advance_after_placement = true;
        self.pending_roll = None;
        self.undo_window = None;
    }

    async fn start_game(&mut self) {
        self.game_active = true;
        let _ = self.supervisor.set_game_active(true).await;
        if self.reconciler.is_none() {
            self.reconciler = Some(spawn_reconciler(
                SharedMirror::clone(&self.local),
                SharedReported::clone(&self.reported),
                self.config.sync.clone(),
                self.reconcile_tx.clone(),
            ));
        }
    }

    async fn end_game(&mut self) {
        if self.game_active {
            self.game_active = false;
            let _ = self.supervisor.set_game_active(false).await;
        }
        self.reconciler = None;
    }

    /// Moves to the next seat, skipping eliminated players.
    fn advance_player(&mut self) {
        if self.seats.is_empty() {
            return;
        }
        let n = self.seats.len() as u8;
        let mut next = (self.current_player + 1) % n;
        for _ in 0..n {
            if !self.eliminated.contains(&PlayerId(next)) {
                break;
            }
            next = (next + 1) % n;
        }
        self.current_player = next;
    }

    fn notify(&self, notice: BoardNotice) {
        // Unbounded by design: a stalled UI must not stall the link
        // pipeline. If the consumer is gone we are shutting down.
        let _ = self.notices.send(notice);
    }
}

// =========================================================================
// Tests (pure helpers; the full flow is covered in tests/orchestrator.rs)
// =========================================================================
