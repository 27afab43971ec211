//! `BoardClient`: the public face of the core.
//!
//! Spawns the link supervisor and the orchestrator and exposes the
//! game-facing operations as plain async methods. Every call is routed
//! to the orchestrator task over a channel and answered on a oneshot,
//! so the caller never touches shared game state directly.

use std::time::Duration;

use droplink_protocol::{PlayerId, WireCodec};
use droplink_session::{spawn_supervisor, LinkState, SessionConfig};
use droplink_sync::{Resolution, SyncConfig};
use droplink_transport::{BoardAddr, BoardDialer};
use tokio::sync::{mpsc, oneshot, watch};

use crate::orchestrator::{
    spawn_orchestrator, ClientCommand, OrchestratorConfig,
};
use crate::{BoardNotice, DroplinkError, PlayerSeat};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and spawning a [`BoardClient`].
pub struct BoardClientBuilder {
    session: SessionConfig,
    sync: SyncConfig,
    undo_window: Duration,
}

impl BoardClientBuilder {
    pub fn new() -> Self {
        Self {
            session: SessionConfig::default(),
            sync: SyncConfig::default(),
            undo_window: Duration::from_secs(5),
        }
    }

    /// Overrides the session (link/retry/watchdog) configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Overrides the reconciler configuration.
    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.sync = config;
        self
    }

    /// Overrides how long an undo stays available after a roll.
    pub fn undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    /// Spawns the background tasks and returns the client plus the
    /// notice stream for the UI and other collaborators.
    pub fn spawn<D, C>(
        self,
        dialer: D,
        codec: C,
    ) -> (BoardClient, mpsc::UnboundedReceiver<BoardNotice>)
    where
        D: BoardDialer,
        C: WireCodec,
    {
        let (supervisor, signals) = spawn_supervisor(dialer, codec, self.session);
        let state_rx = supervisor.state_watch();
        let (commands, notices) = spawn_orchestrator(
            supervisor,
            signals,
            OrchestratorConfig {
                undo_window: self.undo_window,
                sync: self.sync,
            },
        );

        (BoardClient { commands, state_rx }, notices)
    }
}

impl Default for BoardClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to a running Droplink core. Cheap to clone.
#[derive(Clone)]
pub struct BoardClient {
    commands: mpsc::Sender<ClientCommand>,
    state_rx: watch::Receiver<LinkState>,
}

impl BoardClient {
    /// Creates a new builder.
    pub fn builder() -> BoardClientBuilder {
        BoardClientBuilder::new()
    }

    /// Starts connecting to a board. Progress and the eventual Ready
    /// arrive as [`BoardNotice::LinkStateChanged`] notices.
    pub async fn connect(&self, target: BoardAddr) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::Connect { target, reply })
            .await
    }

    /// Disconnects from the board. Idempotent; pending reconnects are
    /// cancelled.
    pub async fn disconnect(&self) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::Disconnect { reply }).await
    }

    /// Authenticates against a password-protected board. Only needed
    /// once per board; the board answers with a `ready` event.
    pub async fn pair(&self, password: impl Into<String>) -> Result<(), DroplinkError> {
        let password = password.into();
        self.ask(|reply| ClientCommand::Pair { password, reply })
            .await
    }

    /// Sets the seats for a new game and, if the link is up, pushes the
    /// matching configuration to the board.
    pub async fn set_roster(
        &self,
        seats: Vec<PlayerSeat>,
    ) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::SetRoster { seats, reply })
            .await
    }

    /// Submits a dice roll for the player whose turn it is.
    pub async fn submit_roll(
        &self,
        player: PlayerId,
        dice: u8,
    ) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::SubmitRoll {
            player,
            dice,
            reply,
        })
        .await
    }

    /// Requests an undo of the most recent move, if its window is still
    /// open. State changes only once the board confirms.
    pub async fn request_undo(&self) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::RequestUndo { reply }).await
    }

    /// Resets the game: every coin back to the start tile, scores to
    /// the starting value, on the board and locally.
    pub async fn request_reset(&self) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::RequestReset { reply })
            .await
    }

    /// Updates the board's nickname and/or pairing password.
    pub async fn update_board_settings(
        &self,
        nickname: Option<String>,
        password: Option<String>,
    ) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::UpdateSettings {
            nickname,
            password,
            reply,
        })
        .await
    }

    /// Settles a raised reconciliation failure.
    pub async fn resolve_reconciliation(
        &self,
        resolution: Resolution,
    ) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::Resolve { resolution, reply })
            .await
    }

    /// Stops everything, in order: reconciler, watchdog and pending
    /// reconnects, then the transport.
    pub async fn shutdown(&self) -> Result<(), DroplinkError> {
        self.ask(|reply| ClientCommand::Shutdown { reply }).await
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Returns `true` when the board link is Ready.
    pub fn is_ready(&self) -> bool {
        self.link_state().is_ready()
    }

    /// A watch on the link state.
    pub fn state_watch(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    async fn ask(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), DroplinkError>>) -> ClientCommand,
    ) -> Result<(), DroplinkError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| DroplinkError::Stopped)?;
        rx.await.map_err(|_| DroplinkError::Stopped)?
    }
}
