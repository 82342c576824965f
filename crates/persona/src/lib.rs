//! Agent personas for the Atrium assistant.
//!
//! A persona is a named behavioral profile: a static system-prompt template
//! plus the trigger keywords the router matches against incoming queries.
//! The persona set is a closed enum; routing is a pure function so
//! decisions are reproducible and testable.

pub mod router;
pub mod template;
pub mod types;

pub use router::select_persona;
pub use template::render_system_prompt;
pub use types::{profile, AgentPersona, PersonaProfile};
