//! Pure match state: the turn/round state machine driven by the controller.

pub mod state_machine;

pub use self::state_machine::{
    MatchSnapshot, MatchState, Move, Phase, RecordOutcome, Role, is_valid_match_code,
};
