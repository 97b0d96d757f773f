use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::net::{NetEvent, NetHandle};
use crate::protocol::{DecodeError, WireMessage};
use crate::services::notifier::Notifier;
use crate::state::{MatchState, Move, Phase, RecordOutcome, Role};

/// Discrete inputs the presentation layer can feed into a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Pick a move for the current round.
    SubmitMove(Move),
    /// Leave the match, telling the opponent first.
    Quit,
    /// Start over at round 1, keeping the accumulated scores.
    PlayAgain,
}

/// Everything that can land on the controller's serialized event queue.
///
/// Inbound lines, user actions, and timer expirations all funnel through
/// one queue consumed by a single task, so the match state is never touched
/// concurrently.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// An action submitted by the local player.
    User(UserAction),
    /// Something the transport delivered.
    Net(NetEvent),
    /// One countdown period elapsed (host only; the host drives the clock).
    CountdownTick,
    /// The round-result display delay elapsed.
    RoundDelayElapsed,
}

/// Pacing for the controller's two timers.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Period between countdown ticks.
    pub countdown_tick: Duration,
    /// How long a round result stays on display before the next round.
    pub round_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_tick: Duration::from_secs(1),
            round_delay: Duration::from_secs(3),
        }
    }
}

/// Glue between the transport, the wire codec, and the match state machine.
///
/// The controller owns the [`MatchState`] outright and runs on a single
/// task; it enforces the host/joiner asymmetry: only the host originates
/// `GAME_START`, `COUNTDOWN` ticks, `ROUND_RESULT`, and `GAME_OVER`, while
/// the joiner reacts to them.
pub(crate) struct SyncController {
    role: Role,
    player_name: String,
    state: MatchState,
    net: NetHandle,
    queue: mpsc::UnboundedSender<SessionEvent>,
    notifier: Arc<dyn Notifier>,
    timings: Timings,
}

impl SyncController {
    pub(crate) fn new(
        role: Role,
        player_name: String,
        state: MatchState,
        net: NetHandle,
        queue: mpsc::UnboundedSender<SessionEvent>,
        notifier: Arc<dyn Notifier>,
        timings: Timings,
    ) -> Self {
        Self {
            role,
            player_name,
            state,
            net,
            queue,
            notifier,
            timings,
        }
    }

    /// Consume the event queue until the local player quits.
    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        self.net.close();
        debug!(role = ?self.role, "controller stopped");
    }

    /// Process one event; returns `false` when the session is over.
    fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::User(action) => self.handle_user_action(action),
            SessionEvent::Net(NetEvent::Line(line)) => {
                match WireMessage::decode(&line) {
                    Ok(message) => self.handle_message(message),
                    Err(err) => self.report_protocol_fault(&line, err),
                }
                true
            }
            SessionEvent::Net(NetEvent::PeerClosed) => {
                // No recovery: a vanished peer simply stops posting events.
                info!(role = ?self.role, "peer connection closed");
                true
            }
            SessionEvent::CountdownTick => {
                self.handle_countdown_tick();
                true
            }
            SessionEvent::RoundDelayElapsed => {
                self.handle_round_delay_elapsed();
                true
            }
        }
    }

    fn handle_user_action(&mut self, action: UserAction) -> bool {
        match action {
            UserAction::SubmitMove(mv) => {
                match self.state.record_move(self.role, mv) {
                    RecordOutcome::Ignored => {
                        debug!(phase = ?self.state.phase(), "move submitted outside choosing; ignored");
                        return true;
                    }
                    RecordOutcome::AwaitingOpponent => {
                        self.send_message(&WireMessage::PlayerChoice {
                            player: self.role,
                            mv,
                        });
                        self.notify();
                    }
                    RecordOutcome::RoundResolved => {
                        self.send_message(&WireMessage::PlayerChoice {
                            player: self.role,
                            mv,
                        });
                        self.round_resolved();
                    }
                }
                true
            }
            UserAction::Quit => {
                self.send_message(&WireMessage::PlayerQuit { player: self.role });
                self.net.close();
                info!(role = ?self.role, "local player quit");
                false
            }
            UserAction::PlayAgain => {
                self.state.reset_keeping_score();
                info!(match_code = %self.state.match_code(), "new game, scores kept");
                self.notify();
                true
            }
        }
    }

    fn handle_message(&mut self, message: WireMessage) {
        match message {
            WireMessage::JoinRequest { player_name } => self.handle_join_request(&player_name),
            WireMessage::JoinAccepted { host_name } => {
                if self.role != Role::Joiner {
                    debug!("ignoring JOIN_ACCEPTED on the host side");
                    return;
                }
                info!(%host_name, "join accepted");
            }
            WireMessage::GameStart { round } => {
                if self.role != Role::Joiner {
                    debug!("ignoring GAME_START on the host side");
                    return;
                }
                info!(round, "game started by host");
                self.state.start_countdown();
                self.notify();
            }
            WireMessage::Countdown { seconds_remaining } => {
                if self.role != Role::Joiner {
                    debug!("ignoring COUNTDOWN on the host side");
                    return;
                }
                // The carried value is informational; the joiner advances
                // its own countdown one tick per received message.
                debug!(seconds_remaining, "countdown tick from host");
                if self.state.tick_countdown().is_some() {
                    self.notify();
                }
            }
            WireMessage::PlayerChoice { player, mv } => self.handle_opponent_choice(player, mv),
            WireMessage::RoundResult {
                round,
                winner,
                host_score,
                joiner_score,
                ..
            } => {
                if self.role != Role::Joiner {
                    debug!("ignoring ROUND_RESULT on the host side");
                    return;
                }
                self.cross_check_outcome(
                    "ROUND_RESULT",
                    round,
                    winner,
                    self.state.round_winner(),
                    host_score,
                    joiner_score,
                );
            }
            WireMessage::GameOver {
                host_score,
                joiner_score,
                winner,
            } => {
                if self.role != Role::Joiner {
                    debug!("ignoring GAME_OVER on the host side");
                    return;
                }
                self.cross_check_outcome(
                    "GAME_OVER",
                    self.state.round(),
                    winner,
                    self.state.game_winner(),
                    host_score,
                    joiner_score,
                );
            }
            WireMessage::PlayerQuit { player } => {
                info!(quitter = ?player, "opponent quit");
                self.net.close();
                self.state.reset_keeping_score();
                self.notifier.opponent_left();
                self.notify();
            }
        }
    }

    /// Host side of the handshake: accept, start the game, begin the clock.
    fn handle_join_request(&mut self, player_name: &str) {
        if self.role != Role::Host {
            debug!("ignoring JOIN_REQUEST on the joiner side");
            return;
        }
        if self.state.phase() != Phase::Waiting {
            warn!(%player_name, phase = ?self.state.phase(), "join request outside waiting; ignored");
            return;
        }

        info!(%player_name, "peer joined, starting game");
        self.send_message(&WireMessage::JoinAccepted {
            host_name: self.player_name.clone(),
        });
        self.send_message(&WireMessage::GameStart {
            round: self.state.round(),
        });
        self.begin_countdown();
    }

    fn handle_opponent_choice(&mut self, player: Role, mv: Move) {
        if player == self.role {
            // A hub with extra peers can reflect our own line back.
            debug!("ignoring our own relayed choice");
            return;
        }
        match self.state.record_move(player, mv) {
            RecordOutcome::Ignored => {
                debug!(phase = ?self.state.phase(), "opponent choice outside choosing; ignored");
            }
            RecordOutcome::AwaitingOpponent => self.notify(),
            RecordOutcome::RoundResolved => self.round_resolved(),
        }
    }

    /// Host clock: apply the tick locally and announce it to the joiner.
    fn handle_countdown_tick(&mut self) {
        let Some(remaining) = self.state.tick_countdown() else {
            // The countdown was abandoned (opponent quit, reset) since the
            // tick was scheduled.
            return;
        };
        self.send_message(&WireMessage::Countdown {
            seconds_remaining: remaining,
        });
        self.notify();
        if remaining > 0 {
            self.schedule_countdown_tick();
        }
    }

    /// Both sides land here once per round, each from its own display delay.
    fn handle_round_delay_elapsed(&mut self) {
        if self.state.phase() != Phase::Results {
            debug!(phase = ?self.state.phase(), "round delay fired outside results; ignored");
            return;
        }

        let continues = self.state.advance_round();
        if continues {
            info!(round = self.state.round(), "starting next round");
            if self.role == Role::Host {
                self.announce_countdown();
            }
            self.notify();
        } else {
            info!(
                score_host = self.state.score_host(),
                score_joiner = self.state.score_joiner(),
                winner = ?self.state.game_winner(),
                is_tie = self.state.is_tie(),
                "game over"
            );
            if self.role == Role::Host {
                self.send_message(&WireMessage::GameOver {
                    host_score: self.state.score_host(),
                    joiner_score: self.state.score_joiner(),
                    winner: self.state.game_winner(),
                });
            }
            self.notify();
        }
    }

    /// Shared tail of move recording once both choices are in.
    fn round_resolved(&mut self) {
        self.notify();

        if self.role == Role::Host {
            let (Some(host_move), Some(joiner_move)) = (
                self.state.move_of(Role::Host),
                self.state.move_of(Role::Joiner),
            ) else {
                warn!("round resolved without both moves recorded");
                return;
            };
            self.send_message(&WireMessage::RoundResult {
                round: self.state.round(),
                winner: self.state.round_winner(),
                host_move,
                joiner_move,
                host_score: self.state.score_host(),
                joiner_score: self.state.score_joiner(),
            });
        }

        self.schedule_round_delay();
    }

    /// Enter the countdown and start announcing it (host only).
    fn begin_countdown(&mut self) {
        self.state.start_countdown();
        self.announce_countdown();
        self.notify();
    }

    /// Emit the opening `COUNTDOWN` line and schedule the tick chain.
    ///
    /// The host announces the full value immediately, then one line per
    /// tick (3, 2, 1, 0). The joiner's countdown is driven purely by these
    /// lines, so the last one lands as a harmless no-op on its side.
    fn announce_countdown(&mut self) {
        self.send_message(&WireMessage::Countdown {
            seconds_remaining: self.state.countdown_remaining(),
        });
        self.schedule_countdown_tick();
    }

    fn schedule_countdown_tick(&self) {
        let queue = self.queue.clone();
        let period = self.timings.countdown_tick;
        tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let _ = queue.send(SessionEvent::CountdownTick);
        });
    }

    fn schedule_round_delay(&self) {
        let queue = self.queue.clone();
        let delay = self.timings.round_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = queue.send(SessionEvent::RoundDelayElapsed);
        });
    }

    /// Compare an authoritative outcome from the host with the local one.
    ///
    /// A mismatch means the two match states have diverged (a lost line,
    /// most likely). There is no recovery protocol; the divergence is
    /// surfaced and the match plays on.
    fn cross_check_outcome(
        &self,
        tag: &str,
        round: u32,
        remote_winner: Option<Role>,
        local_winner: Option<Role>,
        host_score: u32,
        joiner_score: u32,
    ) {
        let scores_match =
            host_score == self.state.score_host() && joiner_score == self.state.score_joiner();
        if remote_winner == local_winner && scores_match {
            debug!(tag, round, "authoritative outcome matches local state");
        } else {
            warn!(
                tag,
                round,
                ?remote_winner,
                ?local_winner,
                host_score,
                joiner_score,
                local_host_score = self.state.score_host(),
                local_joiner_score = self.state.score_joiner(),
                "match states have diverged; no recovery is defined"
            );
        }
    }

    fn report_protocol_fault(&self, line: &str, err: DecodeError) {
        // Dropped; the next line is processed normally.
        warn!(line, error = %err, "dropping undecodable line");
    }

    fn send_message(&self, message: &WireMessage) {
        if !self.net.send(&message.encode()) {
            warn!(message = ?message, "failed to queue outbound message");
        }
    }

    fn notify(&self) {
        self.notifier.state_changed(&self.state.snapshot());
    }
}
