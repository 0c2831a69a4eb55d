pub mod share;

pub use share::ShareCommand;
pub use share::execute as run_share;
