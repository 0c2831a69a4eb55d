pub mod cli;
pub mod commands;
pub mod duration;
pub mod ui;

pub use cli::Cli;
pub use commands::{ShareCommand, run_share};
