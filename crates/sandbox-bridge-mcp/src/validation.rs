// crates/sandbox-bridge-mcp/src/validation.rs
// ============================================================================
// Module: Argument Validation
// Description: Structural validation of untyped tool arguments.
// Purpose: Turn raw JSON arguments into typed, checked tool inputs.
// Dependencies: sandbox-bridge-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Validation runs over every field of the tool's table before reporting, so
//! a single diagnostic lists all offending fields. It has no side effects:
//! the engine is only reached with a [`ValidatedArgs`] value, which nothing
//! else constructs. Absent or `null` arguments are treated as `{}`; unknown
//! keys are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use sandbox_bridge_core::AddressError;
use sandbox_bridge_core::MountName;
use sandbox_bridge_core::RelativePath;
use sandbox_bridge_core::ToolName;
use sandbox_bridge_core::normalize_relative_path;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Numeric bounds applied during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolLimits {
    /// Timeout used when `execute-code` omits one.
    pub default_timeout_ms: u64,
    /// Optional ceiling on requested timeouts; `None` accepts any positive value.
    pub max_timeout_ms: Option<u64>,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            max_timeout_ms: None,
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Typed tool arguments; one variant per tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedArgs {
    /// `execute-code` arguments.
    ExecuteCode {
        /// Source code.
        code: String,
        /// Effective timeout in milliseconds.
        timeout_ms: u64,
    },
    /// `install-packages` arguments.
    InstallPackages {
        /// Whitespace-separated package specs.
        package: String,
    },
    /// `get-mount-points` (no arguments).
    GetMountPoints,
    /// `read-media` arguments.
    ReadMedia {
        /// Mount to read from.
        mount: MountName,
        /// File inside the mount.
        path: RelativePath,
    },
    /// `upload-file` arguments.
    UploadFile {
        /// Mount to read from.
        mount: MountName,
        /// File inside the mount.
        path: RelativePath,
    },
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Argument key (or `arguments` for the whole payload).
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldError {
    /// Builds a field error.
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Validation failure listing every rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid arguments for {tool}: {}", join_errors(.errors))]
pub struct ValidationError {
    /// Tool being validated.
    pub tool: ToolName,
    /// Rejected fields, in table order.
    pub errors: Vec<FieldError>,
}

/// Joins field errors for display.
fn join_errors(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates raw arguments for a tool.
///
/// # Errors
///
/// Returns [`ValidationError`] listing every rejected field.
pub fn validate_arguments(
    tool: ToolName,
    arguments: Option<&Value>,
    limits: &ToolLimits,
) -> Result<ValidatedArgs, ValidationError> {
    let empty = Map::new();
    let map = match arguments {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ValidationError {
                tool,
                errors: vec![FieldError::new("arguments", "must be an object")],
            });
        }
    };
    let mut errors = Vec::new();
    let validated = match tool {
        ToolName::ExecuteCode => {
            let code = required_string(map, "code", &mut errors);
            let timeout_ms = timeout(map, "timeout", limits, &mut errors);
            code.zip(timeout_ms).map(|(code, timeout_ms)| ValidatedArgs::ExecuteCode {
                code,
                timeout_ms,
            })
        }
        ToolName::InstallPackages => {
            required_string(map, "package", &mut errors).and_then(|package| {
                if package.trim().is_empty() {
                    errors.push(FieldError::new("package", "must not be empty"));
                    None
                } else {
                    Some(ValidatedArgs::InstallPackages {
                        package,
                    })
                }
            })
        }
        ToolName::GetMountPoints => Some(ValidatedArgs::GetMountPoints),
        ToolName::ReadMedia => mounted_file(map, &mut errors).map(|(mount, path)| {
            ValidatedArgs::ReadMedia {
                mount,
                path,
            }
        }),
        ToolName::UploadFile => mounted_file(map, &mut errors).map(|(mount, path)| {
            ValidatedArgs::UploadFile {
                mount,
                path,
            }
        }),
    };
    match validated {
        Some(args) if errors.is_empty() => Ok(args),
        _ => Err(ValidationError {
            tool,
            errors,
        }),
    }
}

/// Reads a required string field.
fn required_string(
    map: &Map<String, Value>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match map.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            errors.push(FieldError::new(field, "must be a string"));
            None
        }
    }
}

/// Reads the optional timeout field, applying the configured default.
///
/// Whole values pass through unchanged. Fractional values round up to the
/// next millisecond and values past `u64::MAX` saturate.
fn timeout(
    map: &Map<String, Value>,
    field: &str,
    limits: &ToolLimits,
    errors: &mut Vec<FieldError>,
) -> Option<u64> {
    let value = match map.get(field) {
        None | Some(Value::Null) => return Some(limits.default_timeout_ms),
        Some(Value::Number(number)) => number,
        Some(_) => {
            errors.push(FieldError::new(field, "must be a number"));
            return None;
        }
    };
    let millis = value.as_u64().or_else(|| {
        value.as_f64().filter(|raw| *raw > 0.0).map(|raw| ceil_u64(raw.ceil()))
    });
    match millis {
        None | Some(0) => {
            errors.push(FieldError::new(field, "must be positive"));
            None
        }
        Some(ms) => match limits.max_timeout_ms {
            Some(max) if ms > max => {
                errors.push(FieldError::new(
                    field,
                    format!("must not exceed {max} milliseconds"),
                ));
                None
            }
            _ => Some(ms),
        },
    }
}

/// Converts a positive whole float to `u64`, saturating past the range.
fn ceil_u64(raw: f64) -> u64 {
    format!("{raw:.0}").parse().unwrap_or(u64::MAX)
}

/// Reads the `mountName` and `path` pair.
fn mounted_file(
    map: &Map<String, Value>,
    errors: &mut Vec<FieldError>,
) -> Option<(MountName, RelativePath)> {
    let mount = required_string(map, "mountName", errors).and_then(|raw| {
        MountName::new(raw)
            .map_err(|err| errors.push(FieldError::new("mountName", err.to_string())))
            .ok()
    });
    let path = required_string(map, "path", errors).and_then(|raw| {
        normalize_relative_path(&raw)
            .map_err(|err| errors.push(FieldError::new("path", path_reason(&err))))
            .ok()
    });
    mount.zip(path)
}

/// Maps address errors to field reasons.
const fn path_reason(err: &AddressError) -> &'static str {
    match err {
        AddressError::Absolute => "must be relative to the mount point",
        AddressError::EscapesRoot => "must stay inside the mount point",
        AddressError::ForbiddenCharacter => "contains a forbidden character",
        AddressError::TooLong => "is too long",
        AddressError::EmptyPath
        | AddressError::WrongScheme
        | AddressError::EmptyMount
        | AddressError::InvalidMount(_) => "must name a file",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only assertions on known-good input."
    )]

    use sandbox_bridge_core::ToolName;
    use serde_json::json;

    use super::ToolLimits;
    use super::ValidatedArgs;
    use super::validate_arguments;

    fn limits() -> ToolLimits {
        ToolLimits::default()
    }

    #[test]
    fn execute_code_applies_default_timeout() {
        let args = json!({"code": "print(1)"});
        let validated = validate_arguments(ToolName::ExecuteCode, Some(&args), &limits()).unwrap();
        assert_eq!(
            validated,
            ValidatedArgs::ExecuteCode {
                code: "print(1)".to_string(),
                timeout_ms: 5_000,
            }
        );
    }

    #[test]
    fn execute_code_passes_explicit_timeout_unchanged() {
        for raw in [json!(1), json!(250), json!(300_000), json!(600_000), json!(1500.0)] {
            let args = json!({"code": "x", "timeout": raw});
            let validated =
                validate_arguments(ToolName::ExecuteCode, Some(&args), &limits()).unwrap();
            let ValidatedArgs::ExecuteCode {
                timeout_ms, ..
            } = validated
            else {
                panic!("wrong variant");
            };
            assert_eq!(json!(timeout_ms).as_f64(), raw.as_f64());
        }
    }

    #[test]
    fn missing_code_names_the_field() {
        let err = validate_arguments(ToolName::ExecuteCode, Some(&json!({})), &limits())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments for execute-code: code: is required");
    }

    #[test]
    fn all_field_errors_are_collected() {
        let args = json!({"code": 5, "timeout": -3});
        let err = validate_arguments(ToolName::ExecuteCode, Some(&args), &limits()).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[0].field, "code");
        assert_eq!(err.errors[1].field, "timeout");
        assert!(err.to_string().contains("code: must be a string; timeout: must be positive"));
    }

    #[test]
    fn fractional_timeout_rounds_up_to_next_millisecond() {
        let args = json!({"code": "x", "timeout": 1500.5});
        let validated = validate_arguments(ToolName::ExecuteCode, Some(&args), &limits()).unwrap();
        assert_eq!(
            validated,
            ValidatedArgs::ExecuteCode {
                code: "x".to_string(),
                timeout_ms: 1_501,
            }
        );
    }

    #[test]
    fn timeout_rejects_zero_negative_and_string() {
        for (raw, reason) in [
            (json!(0), "must be positive"),
            (json!(0.0), "must be positive"),
            (json!(-5), "must be positive"),
            (json!("100"), "must be a number"),
        ] {
            let args = json!({"code": "x", "timeout": raw});
            let err =
                validate_arguments(ToolName::ExecuteCode, Some(&args), &limits()).unwrap_err();
            assert!(err.to_string().contains(reason), "{err} should contain {reason}");
        }
    }

    #[test]
    fn configured_ceiling_rejects_larger_timeouts() {
        let capped = ToolLimits {
            max_timeout_ms: Some(300_000),
            ..ToolLimits::default()
        };
        let args = json!({"code": "x", "timeout": 300_001});
        let err = validate_arguments(ToolName::ExecuteCode, Some(&args), &capped).unwrap_err();
        assert!(err.to_string().contains("must not exceed 300000"));
        let args = json!({"code": "x", "timeout": 300_000});
        assert!(validate_arguments(ToolName::ExecuteCode, Some(&args), &capped).is_ok());
    }

    #[test]
    fn null_arguments_are_empty_object() {
        let validated =
            validate_arguments(ToolName::GetMountPoints, Some(&json!(null)), &limits()).unwrap();
        assert_eq!(validated, ValidatedArgs::GetMountPoints);
        let validated = validate_arguments(ToolName::GetMountPoints, None, &limits()).unwrap();
        assert_eq!(validated, ValidatedArgs::GetMountPoints);
    }

    #[test]
    fn non_object_arguments_fail_on_arguments_field() {
        let err = validate_arguments(ToolName::GetMountPoints, Some(&json!([1])), &limits())
            .unwrap_err();
        assert_eq!(err.errors[0].field, "arguments");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let args = json!({"package": "numpy", "extra": true});
        let validated =
            validate_arguments(ToolName::InstallPackages, Some(&args), &limits()).unwrap();
        assert_eq!(
            validated,
            ValidatedArgs::InstallPackages {
                package: "numpy".to_string()
            }
        );
    }

    #[test]
    fn mounted_file_rejects_traversal_and_bad_mount() {
        let args = json!({"mountName": "da/ta", "path": "../../etc/passwd"});
        let err = validate_arguments(ToolName::ReadMedia, Some(&args), &limits()).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[0].field, "mountName");
        assert_eq!(err.errors[1].field, "path");
        assert_eq!(err.errors[1].reason, "must stay inside the mount point");
    }

    #[test]
    fn mounted_file_normalizes_path() {
        let args = json!({"mountName": "data", "path": "./sub//img.png"});
        let validated = validate_arguments(ToolName::UploadFile, Some(&args), &limits()).unwrap();
        let ValidatedArgs::UploadFile {
            mount,
            path,
        } = validated
        else {
            panic!("wrong variant");
        };
        assert_eq!(mount.as_str(), "data");
        assert_eq!(path.as_str(), "sub/img.png");
    }
}
