use thiserror::Error;

use crate::types::{BuildableKind, CardKind};

/// Engine error taxonomy. Validation failures go back to the offending
/// player as an `error` message; nothing here is fatal to the room.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("action not allowed in this phase")]
    WrongPhase,
    #[error("vertex not on the board")]
    UnknownVertex,
    #[error("edge not on the board")]
    UnknownEdge,
    #[error("location already occupied")]
    Occupied,
    #[error("another settlement is too close")]
    DistanceRule,
    #[error("placement must connect to your network")]
    NotConnected,
    #[error("illegal placement of {0}")]
    IllegalPlacement(BuildableKind),
    #[error("no {0:?} left to build")]
    NoneLeft(BuildableKind),
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("the bank cannot cover {0}")]
    BankShort(CardKind),
    #[error("card transfer refused")]
    TransferRefused,
    #[error("invalid trade offer")]
    InvalidOffer,
    #[error("nowhere to build")]
    NowhereToBuild,
    #[error("development card not usable")]
    DevCardNotUsable,
    #[error("ship already moved this turn")]
    ShipAlreadyMoved,
    #[error("game is already over")]
    GameOver,
    #[error("game is not initialized")]
    NotInitialized,
    #[error("invalid map: {0}")]
    InvalidMap(&'static str),
    #[error("player is not part of this game")]
    NotAParticipant,
    #[error("spectators cannot do that")]
    SpectatorsNotAllowed,
    #[error("player already has a pending action")]
    PromptBusy,
    #[error("prompt timed out")]
    Timeout,
    #[error("prompt was cancelled")]
    Cancelled,
    #[error("malformed command payload: {0}")]
    Protocol(&'static str),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("invariant violated: {0}")]
    Invariant(&'static str),
}

impl EngineError {
    /// Timeout and cancellation are flow control for prompts, not faults to
    /// surface to the player.
    pub fn is_prompt_exit(&self) -> bool {
        matches!(self, EngineError::Timeout | EngineError::Cancelled)
    }
}
