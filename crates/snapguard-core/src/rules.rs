//! Classification ruleset handling.
//!
//! Every scan record carries a snapshot of the ruleset that was in force
//! when it was queued, so rules can evolve without making old records
//! ambiguous.

use std::path::Path;

use tracing::warn;

/// Built-in privacy classification ruleset handed to the engine when no
/// override file is configured.
pub const DEFAULT_RULES: &str = r#"# Privacy Classification Rules

## CONFIDENTIAL (Rating 8-10)
- API keys, passwords, tokens, certificates
- Customer personal data (SSN, credit cards, addresses)
- Financial data, salary information
- Medical records, HIPAA protected data
- Legal documents, contracts
- Internal company strategies, unreleased products

## INTERNAL (Rating 5-7)
- Employee directories, org charts
- Internal system screenshots, dashboards
- Company financial reports (non-public)
- Internal project timelines, roadmaps
- Customer lists, business contacts

## RESTRICTED (Rating 3-4)
- Source code, architecture diagrams
- Database schemas, system configurations
- Training materials, internal processes
- Performance data, metrics

## PUBLIC (Rating 0-2)
- Marketing materials, public websites
- Published documentation
- General business information
- Public social media content
"#;

/// Resolve the ruleset text: the override file when configured and
/// readable, the built-in default otherwise.
pub fn load_rules(rules_file: Option<&Path>) -> String {
    match rules_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read rules file, using built-in ruleset"
                );
                DEFAULT_RULES.to_string()
            }
        },
        None => DEFAULT_RULES.to_string(),
    }
}
