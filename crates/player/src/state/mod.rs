//! Client-side game state.

mod game_state;

pub use game_state::{reduce, GameState, GameStore};
