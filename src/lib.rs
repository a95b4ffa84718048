//! Lead Intake — conversational lead capture for the Cria website.

pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod lead;
pub mod tracking;
