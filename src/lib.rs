//! Falling-block puzzle engine with splitting pieces and chain scoring.
//!
//! Clearing a row cuts through the pieces that cross it: the tiles on the row
//! vanish and whatever is left above and below becomes independent pieces
//! that fall on their own. Clears caused by that fall chain, and every link
//! doubles the points.
//!
//! The engine is driven by [`game::Game::handle_input`] and
//! [`game::Game::advance`] and never touches a clock, a terminal or a file.

pub mod config;
pub mod controller;
pub mod error;
pub mod game;
pub mod line_clear;
pub mod piece;
pub mod pile;
pub mod scheduler;
pub mod scoring;

pub use config::Config;
pub use error::ConfigError;
pub use game::{Cell, EndReason, Game, GameEvent, GameState, Input, Tick};
