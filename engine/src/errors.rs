use thiserror::Error;

/// Errors raised by the pure engine layer (§7 taxonomy, the actor-scoped
/// and session-scoped subset that the engine itself can detect).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid action")]
    InvalidAction,
    #[error("not your turn")]
    NotYourTurn,
    #[error("player not in game")]
    NotInGame,
    #[error("unauthorized")]
    Unauthorized,
    #[error("already requested")]
    AlreadyRequested,
    #[error("already seated")]
    AlreadySeated,
    #[error("invalid card or hand")]
    InvalidHand,
    #[error("engine invariant violated in game {game_id} hand {hand_number} phase {phase:?}: {detail}")]
    InvariantViolation {
        game_id: String,
        hand_number: u64,
        phase: crate::hand::Phase,
        detail: String,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
