use thiserror::Error;

use crate::state::{Move, Role};

/// Tag for join request messages.
const TAG_JOIN_REQUEST: &str = "JOIN_REQUEST";
/// Tag for join accepted messages.
const TAG_JOIN_ACCEPTED: &str = "JOIN_ACCEPTED";
/// Tag for game start messages.
const TAG_GAME_START: &str = "GAME_START";
/// Tag for countdown messages.
const TAG_COUNTDOWN: &str = "COUNTDOWN";
/// Tag for player choice messages.
const TAG_PLAYER_CHOICE: &str = "PLAYER_CHOICE";
/// Tag for round result messages.
const TAG_ROUND_RESULT: &str = "ROUND_RESULT";
/// Tag for game over messages.
const TAG_GAME_OVER: &str = "GAME_OVER";
/// Tag for player quit messages.
const TAG_PLAYER_QUIT: &str = "PLAYER_QUIT";

/// Wire spelling of a tied round or game in the `winner` field.
const WINNER_TIE: &str = "Tie";

/// One protocol message, carried as a single `TAG:k=v,k=v,...` text line.
///
/// Values are enum names and decimal integers, so no escaping of `,` or `=`
/// is needed; the free-form name fields must not contain those separators or
/// the line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Joiner announces itself after connecting.
    JoinRequest {
        /// Display name of the joining player.
        player_name: String,
    },
    /// Host acknowledges a join request.
    JoinAccepted {
        /// Display name of the hosting player.
        host_name: String,
    },
    /// Host starts the match at the given round.
    GameStart {
        /// Round the match starts at, 1-based.
        round: u32,
    },
    /// Host announces one countdown tick.
    Countdown {
        /// Seconds left after the tick. Informational: the joiner advances
        /// its own countdown once per received message regardless.
        seconds_remaining: u32,
    },
    /// Either side announces its move for the current round.
    PlayerChoice {
        /// The role the move belongs to.
        player: Role,
        /// The chosen move.
        mv: Move,
    },
    /// Host's authoritative round outcome.
    RoundResult {
        /// Round the result belongs to, 1-based.
        round: u32,
        /// Winning role, or `None` for a tied round.
        winner: Option<Role>,
        /// The host's move that round.
        host_move: Move,
        /// The joiner's move that round.
        joiner_move: Move,
        /// Host score after the round.
        host_score: u32,
        /// Joiner score after the round.
        joiner_score: u32,
    },
    /// Host's authoritative final outcome.
    GameOver {
        /// Final host score.
        host_score: u32,
        /// Final joiner score.
        joiner_score: u32,
        /// Winning role, or `None` for a tied game.
        winner: Option<Role>,
    },
    /// Either side announces it is leaving the match.
    PlayerQuit {
        /// The role that quit.
        player: Role,
    },
}

impl WireMessage {
    /// Serialize this message into its one-line wire form (no terminator).
    pub fn encode(&self) -> String {
        match self {
            WireMessage::JoinRequest { player_name } => {
                format!("{TAG_JOIN_REQUEST}:player_name={player_name}")
            }
            WireMessage::JoinAccepted { host_name } => {
                format!("{TAG_JOIN_ACCEPTED}:host_name={host_name}")
            }
            WireMessage::GameStart { round } => format!("{TAG_GAME_START}:round={round}"),
            WireMessage::Countdown { seconds_remaining } => {
                format!("{TAG_COUNTDOWN}:seconds_remaining={seconds_remaining}")
            }
            WireMessage::PlayerChoice { player, mv } => format!(
                "{TAG_PLAYER_CHOICE}:player={},move={}",
                role_name(*player),
                move_name(*mv)
            ),
            WireMessage::RoundResult {
                round,
                winner,
                host_move,
                joiner_move,
                host_score,
                joiner_score,
            } => format!(
                "{TAG_ROUND_RESULT}:round={round},winner={},host_move={},joiner_move={},host_score={host_score},joiner_score={joiner_score}",
                winner_name(*winner),
                move_name(*host_move),
                move_name(*joiner_move),
            ),
            WireMessage::GameOver {
                host_score,
                joiner_score,
                winner,
            } => format!(
                "{TAG_GAME_OVER}:host_score={host_score},joiner_score={joiner_score},winner={}",
                winner_name(*winner)
            ),
            WireMessage::PlayerQuit { player } => {
                format!("{TAG_PLAYER_QUIT}:player={}", role_name(*player))
            }
        }
    }

    /// Parse one received line back into a typed message.
    ///
    /// Unknown tags and malformed fields come back as a [`DecodeError`]
    /// value; decoding never panics, whatever the peer sent.
    pub fn decode(line: &str) -> Result<WireMessage, DecodeError> {
        let (tag, payload) = line
            .split_once(':')
            .ok_or_else(|| DecodeError::UnknownTag(line.to_string()))?;

        match tag {
            TAG_JOIN_REQUEST => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::JoinRequest {
                    player_name: fields.raw("player_name")?.to_string(),
                })
            }
            TAG_JOIN_ACCEPTED => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::JoinAccepted {
                    host_name: fields.raw("host_name")?.to_string(),
                })
            }
            TAG_GAME_START => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::GameStart {
                    round: fields.integer("round")?,
                })
            }
            TAG_COUNTDOWN => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::Countdown {
                    seconds_remaining: fields.integer("seconds_remaining")?,
                })
            }
            TAG_PLAYER_CHOICE => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::PlayerChoice {
                    player: fields.role("player")?,
                    mv: fields.game_move("move")?,
                })
            }
            TAG_ROUND_RESULT => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::RoundResult {
                    round: fields.integer("round")?,
                    winner: fields.winner("winner")?,
                    host_move: fields.game_move("host_move")?,
                    joiner_move: fields.game_move("joiner_move")?,
                    host_score: fields.integer("host_score")?,
                    joiner_score: fields.integer("joiner_score")?,
                })
            }
            TAG_GAME_OVER => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::GameOver {
                    host_score: fields.integer("host_score")?,
                    joiner_score: fields.integer("joiner_score")?,
                    winner: fields.winner("winner")?,
                })
            }
            TAG_PLAYER_QUIT => {
                let fields = Fields::parse(tag, payload);
                Ok(WireMessage::PlayerQuit {
                    player: fields.role("player")?,
                })
            }
            _ => Err(DecodeError::UnknownTag(tag.to_string())),
        }
    }
}

/// Why a received line could not be turned into a [`WireMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The line's tag (or the whole line, when no `:` is present) matches no
    /// catalogued message.
    #[error("unknown message tag `{0}`")]
    UnknownTag(String),
    /// A required field is absent from the payload.
    #[error("message `{tag}` is missing field `{field}`")]
    MissingField {
        /// Tag of the message being decoded.
        tag: String,
        /// Name of the absent field.
        field: &'static str,
    },
    /// A field is present but its value cannot be interpreted.
    #[error("message `{tag}` has invalid value `{value}` for field `{field}`")]
    InvalidValue {
        /// Tag of the message being decoded.
        tag: String,
        /// Name of the offending field.
        field: &'static str,
        /// The raw value as received.
        value: String,
    },
}

/// Parsed `k=v` pairs of one payload, with typed accessors.
struct Fields<'a> {
    tag: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    fn parse(tag: &'a str, payload: &'a str) -> Self {
        let pairs = payload
            .split(',')
            .filter_map(|part| part.split_once('='))
            .collect();
        Self { tag, pairs }
    }

    fn raw(&self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.pairs
            .iter()
            .find(|(key, _)| *key == field)
            .map(|(_, value)| *value)
            .ok_or_else(|| DecodeError::MissingField {
                tag: self.tag.to_string(),
                field,
            })
    }

    fn invalid(&self, field: &'static str, value: &str) -> DecodeError {
        DecodeError::InvalidValue {
            tag: self.tag.to_string(),
            field,
            value: value.to_string(),
        }
    }

    fn integer(&self, field: &'static str) -> Result<u32, DecodeError> {
        let value = self.raw(field)?;
        value.parse().map_err(|_| self.invalid(field, value))
    }

    fn role(&self, field: &'static str) -> Result<Role, DecodeError> {
        let value = self.raw(field)?;
        parse_role(value).ok_or_else(|| self.invalid(field, value))
    }

    fn game_move(&self, field: &'static str) -> Result<Move, DecodeError> {
        let value = self.raw(field)?;
        match value {
            "ROCK" => Ok(Move::Rock),
            "PAPER" => Ok(Move::Paper),
            "SCISSORS" => Ok(Move::Scissors),
            _ => Err(self.invalid(field, value)),
        }
    }

    fn winner(&self, field: &'static str) -> Result<Option<Role>, DecodeError> {
        let value = self.raw(field)?;
        if value == WINNER_TIE {
            return Ok(None);
        }
        parse_role(value)
            .map(Some)
            .ok_or_else(|| self.invalid(field, value))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Host => "HOST",
        Role::Joiner => "JOINER",
    }
}

fn parse_role(value: &str) -> Option<Role> {
    match value {
        "HOST" => Some(Role::Host),
        "JOINER" => Some(Role::Joiner),
        _ => None,
    }
}

fn move_name(mv: Move) -> &'static str {
    match mv {
        Move::Rock => "ROCK",
        Move::Paper => "PAPER",
        Move::Scissors => "SCISSORS",
    }
}

fn winner_name(winner: Option<Role>) -> &'static str {
    winner.map_or(WINNER_TIE, role_name)
}
