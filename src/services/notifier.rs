use tracing::info;

use crate::state::MatchSnapshot;

/// Callback surface the controller drives after every state transition.
///
/// The presentation layer (window, panels, countdown animation) lives
/// outside this crate; whatever implements this trait is expected to
/// re-render from the snapshot and nothing more. Calls arrive from the
/// controller's single event-processing task.
pub trait Notifier: Send + Sync + 'static {
    /// The match state changed; `snapshot` is the complete new view.
    fn state_changed(&self, snapshot: &MatchSnapshot);

    /// The opponent left the match. Fired once, before the state returns to
    /// the waiting phase.
    fn opponent_left(&self) {}
}

/// Notifier that reports every transition to the tracing log.
///
/// Stands in for a real presentation layer in the console binary.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn state_changed(&self, snapshot: &MatchSnapshot) {
        info!(
            phase = ?snapshot.phase,
            round = snapshot.round,
            score_host = snapshot.score_host,
            score_joiner = snapshot.score_joiner,
            countdown = snapshot.countdown_remaining,
            round_winner = ?snapshot.round_winner,
            game_winner = ?snapshot.game_winner,
            is_tie = snapshot.is_tie,
            "state changed"
        );
    }

    fn opponent_left(&self) {
        info!("opponent left the match");
    }
}
