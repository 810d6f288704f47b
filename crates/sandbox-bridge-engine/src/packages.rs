// crates/sandbox-bridge-engine/src/packages.rs
// ============================================================================
// Module: Package Specs
// Description: Validation of package install specifications.
// Purpose: Keep installer arguments from being interpreted as options.
// Dependencies: sandbox-bridge-core
// ============================================================================

//! ## Overview
//! Install requests arrive as one whitespace-separated string. Each spec is
//! checked before it reaches the installer command line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sandbox_bridge_core::EngineError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of specs in one install request.
const MAX_PACKAGE_SPECS: usize = 32;
/// Maximum length of a single spec.
const MAX_PACKAGE_SPEC_LENGTH: usize = 200;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Splits a whitespace-separated package list and validates each spec.
///
/// Specs may carry version constraints and extras (`numpy>=1.26`,
/// `requests[socks]`) but never start with `-` and never contain path or
/// URL characters.
///
/// # Errors
///
/// Returns [`EngineError::InvalidPackage`] when the list is empty, too long,
/// or a spec contains forbidden characters.
pub fn parse_package_specs(raw: &str) -> Result<Vec<String>, EngineError> {
    let specs: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if specs.is_empty() {
        return Err(EngineError::InvalidPackage("no packages given".to_string()));
    }
    if specs.len() > MAX_PACKAGE_SPECS {
        return Err(EngineError::InvalidPackage(format!(
            "at most {MAX_PACKAGE_SPECS} packages per request"
        )));
    }
    for spec in &specs {
        validate_spec(spec)?;
    }
    Ok(specs)
}

/// Validates one package spec.
fn validate_spec(spec: &str) -> Result<(), EngineError> {
    if spec.len() > MAX_PACKAGE_SPEC_LENGTH {
        return Err(EngineError::InvalidPackage(format!("{spec}: too long")));
    }
    if !spec.chars().next().is_some_and(|ch| ch.is_ascii_alphanumeric()) {
        return Err(EngineError::InvalidPackage(format!(
            "{spec}: must start with a letter or digit"
        )));
    }
    if let Some(ch) = spec.chars().find(|ch| !is_spec_char(*ch)) {
        return Err(EngineError::InvalidPackage(format!("{spec}: invalid character {ch:?}")));
    }
    Ok(())
}

/// Returns true when the character may appear in a package spec.
const fn is_spec_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '.' | '_' | '-' | '=' | '<' | '>' | '!' | '~' | '[' | ']' | ',' | '*')
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good input.")]

    use sandbox_bridge_core::EngineError;

    use super::parse_package_specs;

    #[test]
    fn splits_on_whitespace_and_keeps_constraints() {
        let specs = parse_package_specs("  numpy>=1.26\trequests[socks]  pandas ").unwrap();
        assert_eq!(specs, vec!["numpy>=1.26", "requests[socks]", "pandas"]);
    }

    #[test]
    fn rejects_option_injection_and_urls() {
        for raw in ["--index-url=http://evil", "-e .", "git+https://x/y.git", "../pkg"] {
            assert!(
                matches!(parse_package_specs(raw), Err(EngineError::InvalidPackage(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_list() {
        assert!(matches!(parse_package_specs("   "), Err(EngineError::InvalidPackage(_))));
    }
}
