//! Channels that host dialogue sessions.

pub mod cli;
pub mod ws;

pub use cli::CliChannel;
pub use ws::{ChatState, chat_routes};
