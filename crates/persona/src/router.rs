//! Rule-based persona routing.
//!
//! Deterministic keyword classification: the first persona in priority
//! order whose triggers match wins. A pure function of its inputs — no
//! hidden state — so routing decisions are reproducible. This is a design
//! seam: a learned classifier may be substituted behind the same contract
//! without changing callers.

use crate::types::{profile, AgentPersona};

/// Priority order for trigger matching. `General` is the fallback and has
/// no triggers of its own.
const PRIORITY: [AgentPersona; 3] = [
    AgentPersona::Technical,
    AgentPersona::Sales,
    AgentPersona::CustomerService,
];

/// Select the persona for a query.
///
/// The query is checked first; if no trigger matches, recent history
/// queries are scanned newest-first so a follow-up like "and how much does
/// that cost?" stays with the thread's persona. Falls back to `General`.
pub fn select_persona(query: &str, history: &[String]) -> AgentPersona {
    if let Some(persona) = match_text(query) {
        return persona;
    }

    for past in history.iter().rev() {
        if let Some(persona) = match_text(past) {
            return persona;
        }
    }

    AgentPersona::General
}

/// Match a single text against the trigger sets in priority order.
fn match_text(text: &str) -> Option<AgentPersona> {
    let lower = text.to_lowercase();

    for persona in PRIORITY {
        let triggers = profile(persona).triggers;
        if triggers.iter().any(|t| contains_word(&lower, t)) {
            return Some(persona);
        }
    }

    None
}

/// Whole-word containment, so "planet" does not trigger "plan".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_routing() {
        let persona = select_persona("my wifi connection keeps dropping", &[]);
        assert_eq!(persona, AgentPersona::Technical);
    }

    #[test]
    fn test_sales_routing() {
        let persona = select_persona("which package should I upgrade to?", &[]);
        assert_eq!(persona, AgentPersona::Sales);
    }

    #[test]
    fn test_customer_service_routing() {
        let persona = select_persona("why is my invoice overdue?", &[]);
        assert_eq!(persona, AgentPersona::CustomerService);
    }

    #[test]
    fn test_general_fallback() {
        let persona = select_persona("tell me about the onboarding document", &[]);
        assert_eq!(persona, AgentPersona::General);
    }

    #[test]
    fn test_priority_order_technical_beats_sales() {
        // "speed" (technical) and "upgrade" (sales) both present
        let persona = select_persona("will an upgrade fix my speed?", &[]);
        assert_eq!(persona, AgentPersona::Technical);
    }

    #[test]
    fn test_history_fallback() {
        let history = vec![
            "what plans do you offer?".to_string(),
            "does it include installation?".to_string(),
        ];
        let persona = select_persona("and what about the second option?", &history);
        assert_eq!(persona, AgentPersona::Sales);
    }

    #[test]
    fn test_history_scanned_newest_first() {
        let history = vec![
            "what plans do you offer?".to_string(),
            "my modem shows an error".to_string(),
        ];
        let persona = select_persona("what should I do next?", &history);
        assert_eq!(persona, AgentPersona::Technical);
    }

    #[test]
    fn test_whole_word_matching() {
        // "planet" must not trigger the sales "plan" keyword
        let persona = select_persona("is there a document about planet earth?", &[]);
        assert_eq!(persona, AgentPersona::General);
    }

    #[test]
    fn test_deterministic() {
        let history = vec!["billing question".to_string()];
        let first = select_persona("what is my balance?", &history);
        let second = select_persona("what is my balance?", &history);
        assert_eq!(first, second);
    }
}
