//! The link supervisor: an actor that owns the connection to one board.
//!
//! The supervisor is the single place that dials, retries, and tears
//! down links. It runs as its own task and communicates through a
//! command channel (see [`LinkSupervisorHandle`]); inbound traffic is
//! decoded here and forwarded upward as [`LinkSignal`]s on a bounded
//! queue, so a slow consumer backs up that queue instead of the
//! transport's read loop.
//!
//! ## Lifecycle
//!
//! ```text
//! connect() ──→ dial ──→ negotiate ──→ subscribe ──→ Ready
//!                 │           │             │           │
//!                 └───────────┴─────────────┘           │ drop / silence
//!                      failure → Disconnected ←─────────┘
//!                               │
//!                     game active? → backoff (2 s) → dial …
//!                               │
//!                     budget spent → Exhausted (user decides)
//! ```
//!
//! Two paths tear down a Ready link and they must not double-report:
//! an *organic* drop (the inbound queue closes under us) and the
//! *watchdog* path (we close the link ourselves after silence). The
//! forced-reconnect flag suppresses the organic handling while the
//! watchdog path is in charge, and every loss is reported exactly once
//! as `Lost { cause }`.

use droplink_protocol::{Command, Event, WireCodec};
use droplink_transport::{BoardAddr, BoardDialer, BoardLink};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{
    DisconnectCause, LinkSignal, LinkState, ReconnectBudget, SessionConfig,
    SessionError, Watchdog,
};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Commands sent to the supervisor task.
enum SupervisorCommand {
    Connect { target: BoardAddr },
    Disconnect,
    Send {
        command: Command,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetGameActive(bool),
    Shutdown,
}

/// Handle to a running [`spawn_supervisor`] task. Cheap to clone.
#[derive(Clone)]
pub struct LinkSupervisorHandle {
    tx: mpsc::Sender<SupervisorCommand>,
    state_rx: watch::Receiver<LinkState>,
}

impl LinkSupervisorHandle {
    /// Starts (or restarts) the connect sequence toward `target`.
    ///
    /// Also the "retry now" action after budget exhaustion — an explicit
    /// connect is a fresh user intent and restores the full budget.
    pub async fn connect(&self, target: BoardAddr) -> Result<(), SessionError> {
        self.send(SupervisorCommand::Connect { target }).await
    }

    /// Tears the link down. Idempotent; cancels any pending reconnect.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SupervisorCommand::Disconnect).await
    }

    /// Encodes and sends one command to the board. Fire-and-forget at
    /// the protocol level: success means queued on the link.
    ///
    /// # Errors
    /// [`SessionError::NotReady`] unless the link is Ready.
    pub async fn send_command(&self, command: Command) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SupervisorCommand::Send { command, reply })
            .await
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)?
    }

    /// Tells the supervisor whether a game is in progress. Reconnect
    /// retries and the watchdog only operate mid-game.
    pub async fn set_game_active(&self, active: bool) -> Result<(), SessionError> {
        self.send(SupervisorCommand::SetGameActive(active)).await
    }

    /// Stops the supervisor: cancels pending delays, stops the
    /// watchdog, closes the link, then exits the task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SupervisorCommand::Shutdown).await
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Returns `true` when the link is Ready.
    pub fn is_ready(&self) -> bool {
        self.link_state().is_ready()
    }

    /// A watch on the link state for callers that want change
    /// notifications rather than polling.
    pub fn state_watch(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    async fn send(&self, cmd: SupervisorCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).await.map_err(|_| SessionError::Stopped)
    }
}

/// Spawns the supervisor task.
///
/// Returns the handle plus the signal stream the orchestration layer
/// consumes. The stream is bounded by `config.signal_queue`.
pub fn spawn_supervisor<D, C>(
    dialer: D,
    codec: C,
    config: SessionConfig,
) -> (LinkSupervisorHandle, mpsc::Receiver<LinkSignal>)
where
    D: BoardDialer,
    C: WireCodec,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (signal_tx, signal_rx) = mpsc::channel(config.signal_queue);
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);

    let supervisor = Supervisor {
        dialer,
        codec,
        budget: ReconnectBudget::new(config.max_reconnect_attempts),
        config,
        cmd_rx,
        signal_tx,
        state_tx,
        target: None,
        link: None,
        inbound: None,
        watchdog: None,
        alarm: None,
        backoff_deadline: None,
        game_active: false,
        forced_reconnect: false,
    };
    tokio::spawn(supervisor.run());

    (
        LinkSupervisorHandle {
            tx: cmd_tx,
            state_rx,
        },
        signal_rx,
    )
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// What the select loop woke up for.
enum Step {
    Command(Option<SupervisorCommand>),
    Inbound(Option<Vec<u8>>),
    Alarm(bool),
    Backoff,
}

enum Flow {
    Continue,
    Stop,
}

struct Supervisor<D: BoardDialer, C: WireCodec> {
    dialer: D,
    codec: C,
    budget: ReconnectBudget,
    config: SessionConfig,
    cmd_rx: mpsc::Receiver<SupervisorCommand>,
    signal_tx: mpsc::Sender<LinkSignal>,
    state_tx: watch::Sender<LinkState>,

    /// Last target we were asked to reach; retries re-dial it.
    target: Option<BoardAddr>,
    link: Option<D::Link>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,

    watchdog: Option<Watchdog>,
    alarm: Option<oneshot::Receiver<()>>,
    /// When set, a reconnect attempt fires at this instant. Cleared by
    /// disconnect/shutdown, which is what makes the delay cancellable.
    backoff_deadline: Option<Instant>,

    game_active: bool,
    /// Set while the watchdog path owns the teardown/reconnect cycle;
    /// suppresses the organic-drop notification path.
    forced_reconnect: bool,
}

impl<D: BoardDialer, C: WireCodec> Supervisor<D, C> {
    async fn run(mut self) {
        debug!("link supervisor started");

        loop {
            let step = tokio::select! {
                cmd = self.cmd_rx.recv() => Step::Command(cmd),
                msg = Self::next_inbound(&mut self.inbound) => Step::Inbound(msg),
                fired = Self::alarm_wait(&mut self.alarm) => Step::Alarm(fired),
                _ = Self::backoff_wait(self.backoff_deadline) => Step::Backoff,
            };

            match step {
                Step::Command(None) => break,
                Step::Command(Some(cmd)) => {
                    if let Flow::Stop = self.handle_command(cmd).await {
                        break;
                    }
                }
                Step::Inbound(Some(bytes)) => self.handle_inbound(bytes).await,
                Step::Inbound(None) => self.handle_organic_drop().await,
                Step::Alarm(fired) => {
                    self.alarm = None;
                    if fired {
                        self.handle_watchdog_alarm().await;
                    }
                }
                Step::Backoff => {
                    self.backoff_deadline = None;
                    self.start_connect_cycle().await;
                }
            }
        }

        debug!("link supervisor stopped");
    }

    // -- select arms -------------------------------------------------------

    /// Resolves to the next inbound message, or pends forever when no
    /// link is up (`select!` keeps servicing the other arms).
    async fn next_inbound(inbound: &mut Option<mpsc::Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
        match inbound {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Resolves `true` when the armed watchdog fires, `false` when it
    /// was disarmed underneath us; pends forever with no alarm armed.
    async fn alarm_wait(alarm: &mut Option<oneshot::Receiver<()>>) -> bool {
        match alarm {
            Some(rx) => rx.await.is_ok(),
            None => std::future::pending().await,
        }
    }

    async fn backoff_wait(deadline: Option<Instant>) {
        match deadline {
            Some(at) => time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    // -- command handling --------------------------------------------------

    async fn handle_command(&mut self, cmd: SupervisorCommand) -> Flow {
        match cmd {
            SupervisorCommand::Connect { target } => {
                info!(board = %target, "connect requested");
                // A fresh user intent: drop whatever we had, restore the
                // full retry budget, and start over.
                self.backoff_deadline = None;
                self.forced_reconnect = false;
                self.budget.reset();
                self.teardown_link().await;
                self.set_state(LinkState::Disconnected).await;
                self.target = Some(target);
                self.start_connect_cycle().await;
                Flow::Continue
            }

            SupervisorCommand::Disconnect => {
                self.backoff_deadline = None;
                self.forced_reconnect = false;
                let had_link = self.link.is_some();
                self.teardown_link().await;
                self.set_state(LinkState::Disconnected).await;
                if had_link {
                    self.emit(LinkSignal::Lost {
                        cause: DisconnectCause::UserRequested,
                    })
                    .await;
                }
                Flow::Continue
            }

            SupervisorCommand::Send { command, reply } => {
                let result = self.send_to_board(command).await;
                let _ = reply.send(result);
                Flow::Continue
            }

            SupervisorCommand::SetGameActive(active) => {
                if self.game_active != active {
                    debug!(active, "game activity changed");
                    self.game_active = active;
                    if !active {
                        // No game, no automatic retries.
                        self.backoff_deadline = None;
                    }
                }
                Flow::Continue
            }

            SupervisorCommand::Shutdown => {
                // Teardown order matters: pending delays first, then the
                // watchdog, then the link — no reconnect can race the
                // shutdown.
                self.backoff_deadline = None;
                self.teardown_link().await;
                self.set_state(LinkState::Disconnected).await;
                Flow::Stop
            }
        }
    }

    async fn send_to_board(&mut self, command: Command) -> Result<(), SessionError> {
        if !self.state_tx.borrow().is_ready() {
            return Err(SessionError::NotReady);
        }
        let link = self.link.as_ref().ok_or(SessionError::NotReady)?;
        // Last gate before the wire: a rule-violating command is an
        // error to the caller, never bytes to the board.
        command.validate()?;
        let bytes = self.codec.encode(&command)?;
        link.send(&bytes).await.map_err(SessionError::Link)?;
        Ok(())
    }

    // -- connect sequence --------------------------------------------------

    async fn start_connect_cycle(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };

        self.set_state(LinkState::Connecting).await;
        let mut link = match self.dialer.dial(&target).await {
            Ok(link) => link,
            Err(e) => {
                warn!(board = %target, error = %e, "dial failed");
                self.connect_failed().await;
                return;
            }
        };

        self.set_state(LinkState::NegotiatingCapabilities).await;
        match link
            .negotiate_frame_size(self.config.preferred_frame_size)
            .await
        {
            Ok(granted) => debug!(granted, "capabilities negotiated"),
            Err(e) => {
                warn!(board = %target, error = %e, "negotiation failed");
                link.close().await;
                self.connect_failed().await;
                return;
            }
        }

        self.set_state(LinkState::SubscribingNotifications).await;
        match link.subscribe().await {
            Ok(rx) => {
                self.inbound = Some(rx);
                self.link = Some(link);
                self.enter_ready().await;
            }
            Err(e) => {
                warn!(board = %target, error = %e, "subscribe failed");
                link.close().await;
                self.connect_failed().await;
            }
        }
    }

    async fn enter_ready(&mut self) {
        self.budget.reset();
        self.forced_reconnect = false;
        self.arm_watchdog();
        self.set_state(LinkState::Ready).await;
        info!("board link ready");
        self.emit(LinkSignal::Up).await;
    }

    async fn connect_failed(&mut self) {
        self.set_state(LinkState::Disconnected).await;
        if self.forced_reconnect || self.game_active {
            self.schedule_retry().await;
        }
        // Outside a game a failed connect is left to the caller — the
        // state change already tells them.
    }

    async fn schedule_retry(&mut self) {
        if self.budget.record_attempt() {
            info!(
                attempt = self.budget.attempts(),
                max = self.budget.max_attempts(),
                delay = ?self.config.reconnect_delay,
                "scheduling reconnect"
            );
            self.backoff_deadline = Some(Instant::now() + self.config.reconnect_delay);
        } else {
            warn!("reconnect budget exhausted, waiting for a user decision");
            self.forced_reconnect = false;
            self.emit(LinkSignal::Exhausted).await;
        }
    }

    // -- failure paths -----------------------------------------------------

    /// The inbound queue closed while we still held it: the board side
    /// dropped the link.
    async fn handle_organic_drop(&mut self) {
        self.inbound = None;
        self.teardown_link().await;
        self.set_state(LinkState::Disconnected).await;

        if self.forced_reconnect {
            // The watchdog path already reported this loss and owns the
            // reconnect cycle.
            return;
        }

        warn!("board link dropped");
        self.emit(LinkSignal::Lost {
            cause: DisconnectCause::Organic,
        })
        .await;

        if self.game_active {
            self.schedule_retry().await;
        }
    }

    /// Heartbeat silence while Ready.
    async fn handle_watchdog_alarm(&mut self) {
        if !self.state_tx.borrow().is_ready() {
            return;
        }
        if !self.game_active {
            // No game in progress — silence is expected; keep watching.
            self.arm_watchdog();
            return;
        }

        warn!(
            timeout = ?self.config.heartbeat_timeout,
            "no liveness signal from board, forcing reconnect"
        );
        self.forced_reconnect = true;
        self.teardown_link().await;
        self.set_state(LinkState::Disconnected).await;
        self.emit(LinkSignal::Lost {
            cause: DisconnectCause::WatchdogForced,
        })
        .await;

        // Silence is an independent failure class from a physical
        // disconnect: it gets a fresh retry budget and no settle delay.
        self.budget.reset();
        self.start_connect_cycle().await;
    }

    // -- plumbing ----------------------------------------------------------

    async fn handle_inbound(&mut self, bytes: Vec<u8>) {
        match self.codec.decode::<Event>(&bytes) {
            Ok(event) => {
                // Every decoded event is a liveness signal.
                if let Some(watchdog) = &self.watchdog {
                    watchdog.feed();
                }
                self.emit(LinkSignal::Event(event)).await;
            }
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "dropping malformed message");
            }
        }
    }

    fn arm_watchdog(&mut self) {
        let (watchdog, alarm) = Watchdog::arm(self.config.heartbeat_timeout);
        self.watchdog = Some(watchdog);
        self.alarm = Some(alarm);
    }

    async fn teardown_link(&mut self) {
        self.watchdog = None;
        self.alarm = None;
        self.inbound = None;
        if let Some(link) = self.link.take() {
            link.close().await;
        }
    }

    async fn set_state(&mut self, next: LinkState) {
        let changed = *self.state_tx.borrow() != next;
        if changed {
            debug!(state = %next, "link state");
            self.state_tx.send_replace(next);
            self.emit(LinkSignal::StateChanged(next)).await;
        }
    }

    async fn emit(&self, signal: LinkSignal) {
        // If the consumer is gone we are shutting down anyway; nothing
        // useful to do with the error.
        let _ = self.signal_tx.send(signal).await;
    }
}
