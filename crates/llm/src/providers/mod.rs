//! Completion provider implementations.

pub mod groq;
pub mod mock;

pub use groq::GroqClient;
pub use mock::MockClient;
