use rand::Rng;

/// Fixed role a process plays for the lifetime of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Opens the listening endpoint and is authoritative for round and game outcomes.
    Host,
    /// Opens a single outbound connection and reacts to the host's messages.
    Joiner,
}

impl Role {
    /// The other side of the match.
    pub fn opponent(self) -> Role {
        match self {
            Role::Host => Role::Joiner,
            Role::Joiner => Role::Host,
        }
    }
}

/// One of the three duel moves, locked in a cyclic dominance relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Rock, shown as a circle.
    Rock,
    /// Paper, shown as a square.
    Paper,
    /// Scissors, shown as a triangle.
    Scissors,
}

impl Move {
    /// Whether this move defeats `other`.
    ///
    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock. A move
    /// never beats itself.
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors)
                | (Move::Scissors, Move::Paper)
                | (Move::Paper, Move::Rock)
        )
    }
}

/// Stage of the match state machine. Exactly one is active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an opponent to join.
    Waiting,
    /// Countdown before choosing opens.
    Countdown,
    /// Both players are picking their moves.
    Choosing,
    /// Round outcome is on display.
    Results,
    /// All rounds played; final outcome is on display.
    GameOver,
}

/// Result of feeding a move into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The move was recorded; the opponent has not chosen yet.
    AwaitingOpponent,
    /// Both moves are in and the round outcome has been computed.
    RoundResolved,
    /// The machine was not in the choosing phase; nothing was recorded.
    Ignored,
}

/// Immutable view of the match used by notifier consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Current round, 1-based.
    pub round: u32,
    /// Host's accumulated score.
    pub score_host: u32,
    /// Joiner's accumulated score.
    pub score_joiner: u32,
    /// Seconds left on the countdown; meaningful only during [`Phase::Countdown`].
    pub countdown_remaining: u32,
    /// The host's move for the current round, once chosen.
    pub host_move: Option<Move>,
    /// The joiner's move for the current round, once chosen.
    pub joiner_move: Option<Move>,
    /// Winner of the round on display, if any.
    pub round_winner: Option<Role>,
    /// Winner of the finished game, if any.
    pub game_winner: Option<Role>,
    /// Whether the finished game ended with equal scores.
    pub is_tie: bool,
    /// Out-of-band 5-digit code identifying this match.
    pub match_code: String,
}

/// The per-process view of the match: phase, round, scores, choices, winners.
///
/// All mutation goes through the named operations below; the struct has no
/// internal synchronization and must only be touched from the controller's
/// single event-processing task.
#[derive(Debug, Clone)]
pub struct MatchState {
    phase: Phase,
    round: u32,
    max_rounds: u32,
    countdown_start: u32,
    countdown_remaining: u32,
    score_host: u32,
    score_joiner: u32,
    host_move: Option<Move>,
    joiner_move: Option<Move>,
    round_winner: Option<Role>,
    game_winner: Option<Role>,
    is_tie: bool,
    match_code: String,
}

impl MatchState {
    /// Create a fresh match in [`Phase::Waiting`] at round 1 with a newly
    /// generated match code.
    pub fn new(max_rounds: u32, countdown_seconds: u32) -> Self {
        Self {
            phase: Phase::Waiting,
            round: 1,
            max_rounds,
            countdown_start: countdown_seconds,
            countdown_remaining: countdown_seconds,
            score_host: 0,
            score_joiner: 0,
            host_move: None,
            joiner_move: None,
            round_winner: None,
            game_winner: None,
            is_tie: false,
            match_code: generate_match_code(),
        }
    }

    /// Enter [`Phase::Countdown`] and rewind the countdown to its start value.
    ///
    /// Valid from any phase; the round and scores are untouched.
    pub fn start_countdown(&mut self) {
        self.phase = Phase::Countdown;
        self.countdown_remaining = self.countdown_start;
    }

    /// Take one second off the countdown, returning the new remaining value.
    ///
    /// When the countdown reaches zero the phase advances to
    /// [`Phase::Choosing`]. Outside [`Phase::Countdown`] this is a no-op and
    /// returns `None`; the extra `COUNTDOWN:0` line a joiner receives after
    /// its own countdown already expired lands here.
    pub fn tick_countdown(&mut self) -> Option<u32> {
        if self.phase != Phase::Countdown {
            return None;
        }
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining == 0 {
            self.phase = Phase::Choosing;
        }
        Some(self.countdown_remaining)
    }

    /// Record `mv` for `role` in the current round.
    ///
    /// Only valid in [`Phase::Choosing`]; any other phase ignores the call.
    /// A repeat call for the same role within a round silently overwrites the
    /// earlier move. Once both moves are present the round winner is computed
    /// from the dominance relation (equal moves score nobody), the winner's
    /// score increments by one, and the phase moves to [`Phase::Results`].
    pub fn record_move(&mut self, role: Role, mv: Move) -> RecordOutcome {
        if self.phase != Phase::Choosing {
            return RecordOutcome::Ignored;
        }

        match role {
            Role::Host => self.host_move = Some(mv),
            Role::Joiner => self.joiner_move = Some(mv),
        }

        let (Some(host_move), Some(joiner_move)) = (self.host_move, self.joiner_move) else {
            return RecordOutcome::AwaitingOpponent;
        };

        self.round_winner = if host_move == joiner_move {
            None
        } else if host_move.beats(joiner_move) {
            self.score_host += 1;
            Some(Role::Host)
        } else {
            self.score_joiner += 1;
            Some(Role::Joiner)
        };
        self.phase = Phase::Results;
        RecordOutcome::RoundResolved
    }

    /// Move on from the round on display.
    ///
    /// Increments the round counter. When rounds remain, clears both moves
    /// and the round winner, restarts the countdown, and returns `true`. When
    /// rounds are exhausted, computes the game winner from the scores (equal
    /// scores tie), enters [`Phase::GameOver`], and returns `false`.
    pub fn advance_round(&mut self) -> bool {
        self.round += 1;
        if self.round > self.max_rounds {
            if self.score_host == self.score_joiner {
                self.game_winner = None;
                self.is_tie = true;
            } else if self.score_host > self.score_joiner {
                self.game_winner = Some(Role::Host);
                self.is_tie = false;
            } else {
                self.game_winner = Some(Role::Joiner);
                self.is_tie = false;
            }
            self.phase = Phase::GameOver;
            return false;
        }

        self.host_move = None;
        self.joiner_move = None;
        self.round_winner = None;
        self.start_countdown();
        true
    }

    /// Return to round 1 in [`Phase::Waiting`] with a fresh match code,
    /// keeping the accumulated scores.
    pub fn reset_keeping_score(&mut self) {
        self.round = 1;
        self.host_move = None;
        self.joiner_move = None;
        self.round_winner = None;
        self.game_winner = None;
        self.is_tie = false;
        self.phase = Phase::Waiting;
        self.countdown_remaining = self.countdown_start;
        self.match_code = generate_match_code();
    }

    /// As [`reset_keeping_score`](Self::reset_keeping_score) plus zeroing
    /// both scores.
    pub fn reset_full(&mut self) {
        self.score_host = 0;
        self.score_joiner = 0;
        self.reset_keeping_score();
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current round, 1-based.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Configured number of rounds per game.
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Host's accumulated score.
    pub fn score_host(&self) -> u32 {
        self.score_host
    }

    /// Joiner's accumulated score.
    pub fn score_joiner(&self) -> u32 {
        self.score_joiner
    }

    /// The move recorded for `role` this round, if any.
    pub fn move_of(&self, role: Role) -> Option<Move> {
        match role {
            Role::Host => self.host_move,
            Role::Joiner => self.joiner_move,
        }
    }

    /// Seconds left on the countdown; meaningful only during [`Phase::Countdown`].
    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    /// Winner of the round on display, `None` for a tie or an unresolved round.
    pub fn round_winner(&self) -> Option<Role> {
        self.round_winner
    }

    /// Winner of the finished game, `None` for a tie or an unfinished game.
    pub fn game_winner(&self) -> Option<Role> {
        self.game_winner
    }

    /// Whether the finished game ended with equal scores.
    pub fn is_tie(&self) -> bool {
        self.is_tie
    }

    /// The out-of-band 5-digit code identifying this match.
    pub fn match_code(&self) -> &str {
        &self.match_code
    }

    /// Adopt the match code typed by the joining player.
    pub fn set_match_code(&mut self, code: String) {
        self.match_code = code;
    }

    /// Capture the current state for notifier consumers.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            phase: self.phase,
            round: self.round,
            score_host: self.score_host,
            score_joiner: self.score_joiner,
            countdown_remaining: self.countdown_remaining,
            host_move: self.host_move,
            joiner_move: self.joiner_move,
            round_winner: self.round_winner,
            game_winner: self.game_winner,
            is_tie: self.is_tie,
            match_code: self.match_code.clone(),
        }
    }
}

/// Generate a 5-digit decimal match code.
///
/// The code travels out-of-band (displayed to the hosting user, typed by the
/// joining user); it is never sent over the socket.
fn generate_match_code() -> String {
    rand::rng().random_range(10_000..=99_999).to_string()
}

/// Whether `code` has the shape of a match code: exactly five ASCII digits.
pub fn is_valid_match_code(code: &str) -> bool {
    code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVES: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    fn choosing_state() -> MatchState {
        let mut state = MatchState::new(3, 3);
        state.start_countdown();
        while state.phase() == Phase::Countdown {
            state.tick_countdown();
        }
        state
    }

    #[test]
    fn beats_has_no_fixed_point() {
        for mv in MOVES {
            assert!(!mv.beats(mv));
        }
    }

    #[test]
    fn beats_is_total_and_antisymmetric_on_distinct_pairs() {
        for a in MOVES {
            for b in MOVES {
                if a == b {
                    continue;
                }
                assert!(
                    a.beats(b) ^ b.beats(a),
                    "exactly one of {a:?}/{b:?} must win"
                );
            }
        }
    }

    #[test]
    fn new_match_starts_waiting_at_round_one() {
        let state = MatchState::new(3, 3);
        assert_eq!(state.phase(), Phase::Waiting);
        assert_eq!(state.round(), 1);
        assert_eq!(state.score_host(), 0);
        assert_eq!(state.score_joiner(), 0);
        assert!(is_valid_match_code(state.match_code()));
    }

    #[test]
    fn countdown_runs_down_to_choosing() {
        let mut state = MatchState::new(3, 3);
        state.start_countdown();
        assert_eq!(state.phase(), Phase::Countdown);
        assert_eq!(state.tick_countdown(), Some(2));
        assert_eq!(state.tick_countdown(), Some(1));
        assert_eq!(state.tick_countdown(), Some(0));
        assert_eq!(state.phase(), Phase::Choosing);
    }

    #[test]
    fn tick_outside_countdown_is_a_noop() {
        let mut state = MatchState::new(3, 3);
        assert_eq!(state.tick_countdown(), None);
        assert_eq!(state.phase(), Phase::Waiting);

        let mut state = choosing_state();
        assert_eq!(state.tick_countdown(), None);
        assert_eq!(state.phase(), Phase::Choosing);
    }

    #[test]
    fn recording_outside_choosing_is_ignored() {
        let mut state = MatchState::new(3, 3);
        assert_eq!(
            state.record_move(Role::Host, Move::Rock),
            RecordOutcome::Ignored
        );
        assert_eq!(state.move_of(Role::Host), None);
    }

    #[test]
    fn both_moves_resolve_the_round_with_one_winner() {
        let mut state = choosing_state();
        assert_eq!(
            state.record_move(Role::Host, Move::Rock),
            RecordOutcome::AwaitingOpponent
        );
        assert_eq!(
            state.record_move(Role::Joiner, Move::Scissors),
            RecordOutcome::RoundResolved
        );
        assert_eq!(state.phase(), Phase::Results);
        assert_eq!(state.round_winner(), Some(Role::Host));
        assert_eq!(state.score_host(), 1);
        assert_eq!(state.score_joiner(), 0);
    }

    #[test]
    fn equal_moves_tie_and_score_nobody() {
        let mut state = choosing_state();
        state.record_move(Role::Host, Move::Paper);
        assert_eq!(
            state.record_move(Role::Joiner, Move::Paper),
            RecordOutcome::RoundResolved
        );
        assert_eq!(state.phase(), Phase::Results);
        assert_eq!(state.round_winner(), None);
        assert_eq!(state.score_host(), 0);
        assert_eq!(state.score_joiner(), 0);
    }

    #[test]
    fn repeat_move_for_same_role_overwrites() {
        let mut state = choosing_state();
        state.record_move(Role::Host, Move::Rock);
        assert_eq!(
            state.record_move(Role::Host, Move::Paper),
            RecordOutcome::AwaitingOpponent
        );
        assert_eq!(state.move_of(Role::Host), Some(Move::Paper));

        state.record_move(Role::Joiner, Move::Rock);
        assert_eq!(state.round_winner(), Some(Role::Host));
    }

    #[test]
    fn first_round_win_then_advance_starts_round_two_countdown() {
        let mut state = choosing_state();
        state.record_move(Role::Host, Move::Paper);
        state.record_move(Role::Joiner, Move::Rock);
        assert_eq!(state.score_host(), 1);
        assert_eq!(state.score_joiner(), 0);
        assert_eq!(state.round_winner(), Some(Role::Host));

        assert!(state.advance_round());
        assert_eq!(state.round(), 2);
        assert_eq!(state.phase(), Phase::Countdown);
        assert_eq!(state.move_of(Role::Host), None);
        assert_eq!(state.move_of(Role::Joiner), None);
        assert_eq!(state.round_winner(), None);
    }

    #[test]
    fn exhausted_rounds_end_the_game_consistently() {
        let mut state = MatchState::new(3, 3);
        state.start_countdown();
        // Joiner takes rounds 1 and 3, host takes round 2.
        let rounds = [
            (Move::Rock, Move::Paper),
            (Move::Scissors, Move::Paper),
            (Move::Paper, Move::Scissors),
        ];
        for (index, (host_mv, joiner_mv)) in rounds.into_iter().enumerate() {
            while state.phase() == Phase::Countdown {
                state.tick_countdown();
            }
            state.record_move(Role::Host, host_mv);
            state.record_move(Role::Joiner, joiner_mv);
            let continues = state.advance_round();
            assert_eq!(continues, index < 2);
        }

        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.score_host(), 1);
        assert_eq!(state.score_joiner(), 2);
        assert_eq!(state.game_winner(), Some(Role::Joiner));
        assert!(!state.is_tie());
    }

    #[test]
    fn even_scores_tie_the_game() {
        let mut state = MatchState::new(1, 3);
        state.start_countdown();
        while state.phase() == Phase::Countdown {
            state.tick_countdown();
        }
        state.record_move(Role::Host, Move::Rock);
        state.record_move(Role::Joiner, Move::Rock);
        assert!(!state.advance_round());
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.game_winner(), None);
        assert!(state.is_tie());
    }

    #[test]
    fn score_never_exceeds_completed_rounds() {
        let mut state = MatchState::new(3, 3);
        state.start_countdown();
        for _ in 0..3 {
            while state.phase() == Phase::Countdown {
                state.tick_countdown();
            }
            state.record_move(Role::Host, Move::Rock);
            state.record_move(Role::Joiner, Move::Scissors);
            assert!(state.score_host() + state.score_joiner() <= state.round());
            state.advance_round();
        }
    }

    #[test]
    fn reset_keeping_score_keeps_scores_and_clears_the_rest() {
        let mut state = choosing_state();
        state.record_move(Role::Host, Move::Rock);
        state.record_move(Role::Joiner, Move::Scissors);

        state.reset_keeping_score();
        assert_eq!(state.phase(), Phase::Waiting);
        assert_eq!(state.round(), 1);
        assert_eq!(state.score_host(), 1);
        assert_eq!(state.move_of(Role::Host), None);
        assert_eq!(state.round_winner(), None);
        assert!(is_valid_match_code(state.match_code()));
    }

    #[test]
    fn reset_full_zeroes_scores() {
        let mut state = choosing_state();
        state.record_move(Role::Host, Move::Rock);
        state.record_move(Role::Joiner, Move::Scissors);

        state.reset_full();
        assert_eq!(state.score_host(), 0);
        assert_eq!(state.score_joiner(), 0);
        assert_eq!(state.phase(), Phase::Waiting);
    }

    #[test]
    fn match_code_validation_accepts_five_digits_only() {
        assert!(is_valid_match_code("12345"));
        assert!(!is_valid_match_code("1234"));
        assert!(!is_valid_match_code("123456"));
        assert!(!is_valid_match_code("12a45"));
        assert!(!is_valid_match_code(""));
    }
}
