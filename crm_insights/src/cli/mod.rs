pub mod commands;
pub mod params;
pub mod prompt;
pub mod report;

pub use commands::{Cli, Commands};
pub use prompt::StdinGate;
