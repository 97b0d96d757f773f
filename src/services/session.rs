use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::net::{self, NetEvent};
use crate::protocol::WireMessage;
use crate::services::controller::{SessionEvent, SyncController, Timings, UserAction};
use crate::services::notifier::Notifier;
use crate::state::{MatchState, Role, is_valid_match_code};

/// Live handle to a running match session.
///
/// Dropping the handle does not tear the session down; submit
/// [`UserAction::Quit`] to end it cleanly.
pub struct SessionHandle {
    queue: mpsc::UnboundedSender<SessionEvent>,
    local_addr: SocketAddr,
    match_code: String,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue a user action for the controller. Returns `false` once the
    /// controller has stopped.
    pub fn submit(&self, action: UserAction) -> bool {
        self.queue.send(SessionEvent::User(action)).is_ok()
    }

    /// The 5-digit code to hand to the joining player (host side), or the
    /// code that was typed in (joiner side).
    pub fn match_code(&self) -> &str {
        &self.match_code
    }

    /// Bound listener address (host) or local connection address (joiner).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the controller to finish (after a local quit).
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Open a listening endpoint and run the authoritative side of a match.
///
/// Returns as soon as the listener is bound; the controller then waits for
/// a `JOIN_REQUEST` to start the game.
pub fn host_session(
    config: &AppConfig,
    player_name: String,
    notifier: Arc<dyn Notifier>,
    timings: Timings,
) -> Result<SessionHandle, SessionError> {
    let (net_tx, net_rx) = mpsc::unbounded_channel();
    let net = net::listen_and_serve(config.port, net_tx).map_err(SessionError::Bind)?;

    let state = MatchState::new(config.max_rounds, config.countdown_seconds);
    info!(
        match_code = %state.match_code(),
        addr = %net::local_ipv4(),
        port = net.local_addr().port(),
        "hosting a match"
    );

    Ok(spawn_session(
        Role::Host,
        player_name,
        state,
        net,
        net_rx,
        notifier,
        timings,
    ))
}

/// Connect to a hosting peer and run the reactive side of a match.
///
/// The `code` is the 5-digit match code the hosting player shared
/// out-of-band; it is validated for shape here and never sent over the
/// wire. Connection failures are retryable: a fresh call may succeed once
/// the host is up.
pub async fn join_session(
    config: &AppConfig,
    host: &str,
    code: &str,
    player_name: String,
    notifier: Arc<dyn Notifier>,
    timings: Timings,
) -> Result<SessionHandle, SessionError> {
    if !is_valid_match_code(code) {
        return Err(SessionError::InvalidMatchCode(code.to_string()));
    }

    let (net_tx, net_rx) = mpsc::unbounded_channel();
    let net = net::connect(host, config.port, net_tx)
        .await
        .map_err(SessionError::Connect)?;

    info!(%host, port = config.port, %code, "joined a match");
    net.send(
        &WireMessage::JoinRequest {
            player_name: player_name.clone(),
        }
        .encode(),
    );

    let mut state = MatchState::new(config.max_rounds, config.countdown_seconds);
    state.set_match_code(code.to_string());

    Ok(spawn_session(
        Role::Joiner,
        player_name,
        state,
        net,
        net_rx,
        notifier,
        timings,
    ))
}

/// Wire the event queue, start the controller task, and hand back a handle.
fn spawn_session(
    role: Role,
    player_name: String,
    state: MatchState,
    net: net::NetHandle,
    mut net_rx: mpsc::UnboundedReceiver<NetEvent>,
    notifier: Arc<dyn Notifier>,
    timings: Timings,
) -> SessionHandle {
    let (queue, events) = mpsc::unbounded_channel();

    // Marshal transport deliveries onto the controller's serialized queue;
    // the forwarder ends when the transport's last task does.
    let forward = queue.clone();
    tokio::spawn(async move {
        while let Some(event) = net_rx.recv().await {
            if forward.send(SessionEvent::Net(event)).is_err() {
                break;
            }
        }
    });

    let local_addr = net.local_addr();
    let match_code = state.match_code().to_string();
    let controller = SyncController::new(
        role,
        player_name,
        state,
        net,
        queue.clone(),
        notifier,
        timings,
    );
    let task = tokio::spawn(controller.run(events));

    SessionHandle {
        queue,
        local_addr,
        match_code,
        task,
    }
}
