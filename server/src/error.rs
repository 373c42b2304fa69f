//! §7 session/actor-scoped error taxonomy. `holdem_engine::EngineError`
//! covers the subset the pure engine can detect; this wraps it with the
//! server-only variants (rehydration, persistence, not-found) and tracks
//! which failures are actor-scoped (echoed to the caller only) versus
//! session-scoped (end the game).

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] holdem_engine::EngineError),

    #[error("game not found")]
    GameNotFound,

    #[error("rehydration failed after retries")]
    RehydrationFailure,

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("already in an active game")]
    AlreadyInActiveGame,
}

impl ApiError {
    /// §7: actor-scoped failures are echoed as `error { message }` without
    /// touching session state; everything else is session-scoped.
    pub fn is_actor_scoped(&self) -> bool {
        matches!(
            self,
            ApiError::Engine(
                holdem_engine::EngineError::InvalidAction
                    | holdem_engine::EngineError::NotYourTurn
                    | holdem_engine::EngineError::NotInGame
                    | holdem_engine::EngineError::Unauthorized
                    | holdem_engine::EngineError::AlreadyRequested
                    | holdem_engine::EngineError::AlreadySeated
                    | holdem_engine::EngineError::InvalidHand
            ) | ApiError::GameNotFound
                | ApiError::AlreadyInActiveGame
        )
    }

    pub fn wire_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violation_is_session_scoped() {
        let err = ApiError::Engine(holdem_engine::EngineError::InvariantViolation {
            game_id: "g1".into(),
            hand_number: 1,
            phase: holdem_engine::Phase::Preflop,
            detail: "test".into(),
        });
        assert!(!err.is_actor_scoped());
    }

    #[test]
    fn not_your_turn_is_actor_scoped() {
        let err = ApiError::Engine(holdem_engine::EngineError::NotYourTurn);
        assert!(err.is_actor_scoped());
    }
}
