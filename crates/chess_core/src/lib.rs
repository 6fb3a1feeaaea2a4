pub mod board;
pub mod game;
pub mod movegen;
pub mod types;

// Re-export the rules engine surface
pub use board::*;
pub use game::*;
pub use movegen::*;
pub use types::*;
