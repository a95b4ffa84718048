//! Lead submission — packaging and persisting a completed dialogue.

pub mod memory;
pub mod model;
pub mod submitter;

pub use memory::{MemoryLeadStore, StoredLead};
pub use model::{LeadReceipt, LeadSubmission, generate_protocol};
pub use submitter::{HttpLeadSubmitter, LeadSubmitter};
