// Resume Analysis Pipeline
// Implements: upload → preview → AI scoring → JSON extraction → score normalization → persistence.
// All collaborator access goes through the traits in crate::platform.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod library;
pub mod orchestrator;
pub mod prompts;
pub mod record;
pub mod scoring;
pub mod status;

#[cfg(test)]
pub mod testing;

// Re-export the public API consumed by other modules (state, main).
pub use orchestrator::Analyzer;
