pub mod turn_controller;

pub use turn_controller::{
    FETCH_ERROR_MESSAGE, PendingTurn, SubmitRejected, TurnController, TurnOutcome, TurnState,
};
