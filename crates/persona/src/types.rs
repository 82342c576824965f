//! Persona definitions.
//!
//! Each persona carries a static Handlebars template for its system prompt
//! and the trigger keywords used by the router. Configuration data, not
//! user-mutable at runtime.

use serde::{Deserialize, Serialize};

/// The closed set of agent personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentPersona {
    Technical,
    Sales,
    CustomerService,
    General,
}

impl AgentPersona {
    /// All personas, in router priority order (General last, as fallback).
    pub const ALL: [AgentPersona; 4] = [
        AgentPersona::Technical,
        AgentPersona::Sales,
        AgentPersona::CustomerService,
        AgentPersona::General,
    ];

    /// Canonical persona name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentPersona::Technical => "technical",
            AgentPersona::Sales => "sales",
            AgentPersona::CustomerService => "customer-service",
            AgentPersona::General => "general",
        }
    }
}

impl std::fmt::Display for AgentPersona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static behavioral profile for a persona.
#[derive(Debug, Clone, Copy)]
pub struct PersonaProfile {
    /// Which persona this profile describes
    pub persona: AgentPersona,

    /// Keywords that route a query to this persona
    pub triggers: &'static [&'static str],

    /// Handlebars template for the system prompt.
    /// Variables: `context` (citation-tagged document excerpts).
    pub template: &'static str,
}

const SHARED_RULES: &str = "Rules: Only answer questions about the documents above. \
Cite the excerpts you used with their markers, e.g. [S1]. \
If the question is unrelated to the documents, say: \
'I can only answer questions about the provided documents.' \
Be concise and professional.";

const TECHNICAL_TRIGGERS: &[&str] = &[
    "network",
    "connection",
    "internet",
    "wifi",
    "router",
    "modem",
    "speed",
    "slow",
    "error",
    "troubleshoot",
    "technical",
    "device",
    "configuration",
    "settings",
    "password",
    "reset",
];

const SALES_TRIGGERS: &[&str] = &[
    "plan",
    "package",
    "price",
    "cost",
    "upgrade",
    "product",
    "offer",
    "deal",
    "promotion",
    "compare",
    "recommend",
    "features",
    "benefits",
    "contract",
    "installation",
];

const CUSTOMER_SERVICE_TRIGGERS: &[&str] = &[
    "bill",
    "payment",
    "invoice",
    "charge",
    "fee",
    "billing",
    "account",
    "statement",
    "due",
    "overdue",
    "refund",
    "cancel",
    "complaint",
];

static PROFILES: [PersonaProfile; 4] = [
    PersonaProfile {
        persona: AgentPersona::Technical,
        triggers: TECHNICAL_TRIGGERS,
        template: "You are a technical support specialist for an internal enterprise \
assistant. Diagnose problems step by step and give actionable instructions, \
grounded only in these documents:\n\n{{context}}\n\n{{rules}}",
    },
    PersonaProfile {
        persona: AgentPersona::Sales,
        triggers: SALES_TRIGGERS,
        template: "You are a sales advisor for an internal enterprise assistant. \
Explain plans, pricing, and product options, grounded only in these documents:\n\n\
{{context}}\n\n{{rules}}",
    },
    PersonaProfile {
        persona: AgentPersona::CustomerService,
        triggers: CUSTOMER_SERVICE_TRIGGERS,
        template: "You are a customer service representative for an internal enterprise \
assistant. Resolve account and billing questions with empathy, grounded only in \
these documents:\n\n{{context}}\n\n{{rules}}",
    },
    PersonaProfile {
        persona: AgentPersona::General,
        triggers: &[],
        template: "You are an internal enterprise assistant. Answer questions based on \
these documents:\n\n{{context}}\n\n{{rules}}",
    },
];

/// Look up the static profile for a persona.
pub fn profile(persona: AgentPersona) -> &'static PersonaProfile {
    PROFILES
        .iter()
        .find(|p| p.persona == persona)
        .expect("every persona has a profile")
}

/// The shared grounding rules appended to every persona template.
pub(crate) fn shared_rules() -> &'static str {
    SHARED_RULES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_persona_has_profile() {
        for persona in AgentPersona::ALL {
            let profile = profile(persona);
            assert_eq!(profile.persona, persona);
            assert!(profile.template.contains("{{context}}"));
        }
    }

    #[test]
    fn test_general_has_no_triggers() {
        assert!(profile(AgentPersona::General).triggers.is_empty());
    }

    #[test]
    fn test_persona_names() {
        assert_eq!(AgentPersona::CustomerService.as_str(), "customer-service");
        assert_eq!(AgentPersona::General.to_string(), "general");
    }

    #[test]
    fn test_persona_serde_kebab_case() {
        let json = serde_json::to_string(&AgentPersona::CustomerService).unwrap();
        assert_eq!(json, "\"customer-service\"");

        let parsed: AgentPersona = serde_json::from_str("\"technical\"").unwrap();
        assert_eq!(parsed, AgentPersona::Technical);
    }
}
