// crates/sandbox-bridge-mcp/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Tool descriptors and their input schemas.
// Purpose: Build the immutable tool list advertised by tools/list.
// Dependencies: sandbox-bridge-core, serde_json
// ============================================================================

//! ## Overview
//! Every tool is described by a static field table. The JSON Schema returned
//! by `tools/list` and the argument validator both read the same table, so
//! the advertised contract and the enforced contract cannot drift. The only
//! runtime input is the configured execution timeout default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sandbox_bridge_core::ToolName;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::validation::ToolLimits;

// ============================================================================
// SECTION: Field Tables
// ============================================================================

/// JSON type of a tool field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string.
    String,
    /// JSON number (whole milliseconds).
    Milliseconds,
}

/// One input field of a tool.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Argument key.
    pub name: &'static str,
    /// Expected JSON type.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
    /// Client-facing description.
    pub description: &'static str,
}

/// Field table for `execute-code`.
const EXECUTE_CODE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "code",
        kind: FieldKind::String,
        required: true,
        description: "Python code to execute",
    },
    FieldSpec {
        name: "timeout",
        kind: FieldKind::Milliseconds,
        required: false,
        description: "Execution timeout in milliseconds",
    },
];

/// Field table for `install-packages`.
const INSTALL_PACKAGES_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "package",
    kind: FieldKind::String,
    required: true,
    description: "Package(s) to install, space-separated (e.g. 'numpy matplotlib pandas')",
}];

/// Field table for tools addressing a mounted file.
const MOUNTED_FILE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "mountName",
        kind: FieldKind::String,
        required: true,
        description: "Name of the mount point, as returned by get-mount-points (e.g. 'data')",
    },
    FieldSpec {
        name: "path",
        kind: FieldKind::String,
        required: true,
        description: "Path of the file relative to the mount point (e.g. 'image.png')",
    },
];

/// Returns the field table for a tool.
#[must_use]
pub const fn field_specs(tool: ToolName) -> &'static [FieldSpec] {
    match tool {
        ToolName::ExecuteCode => EXECUTE_CODE_FIELDS,
        ToolName::InstallPackages => INSTALL_PACKAGES_FIELDS,
        ToolName::GetMountPoints => &[],
        ToolName::ReadMedia | ToolName::UploadFile => MOUNTED_FILE_FIELDS,
    }
}

/// Returns the client-facing description of a tool.
#[must_use]
pub const fn tool_description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::ExecuteCode => {
            "Execute Python code in the sandbox and return captured stdout and stderr. A \
             non-zero exit status is reported as a tool error."
        }
        ToolName::InstallPackages => {
            "Install Python packages into the sandbox. Multiple packages can be given \
             space-separated."
        }
        ToolName::GetMountPoints => "List mounted directories",
        ToolName::ReadMedia => "Read an image or audio file from a mounted directory",
        ToolName::UploadFile => {
            "Upload a file from a mounted directory and return a URL the user can download it from"
        }
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool descriptor returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Immutable tool registry.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    /// Definitions in canonical order.
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Builds descriptors for every tool.
    #[must_use]
    pub fn new(limits: &ToolLimits) -> Self {
        let definitions = ToolName::all()
            .iter()
            .map(|tool| ToolDefinition {
                name: *tool,
                description: tool_description(*tool).to_string(),
                input_schema: input_schema(field_specs(*tool), limits),
            })
            .collect();
        Self {
            definitions,
        }
    }

    /// Returns the registered definitions.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }
}

/// Renders a field table as a JSON Schema object.
fn input_schema(fields: &[FieldSpec], limits: &ToolLimits) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let property = match field.kind {
            FieldKind::String => json!({
                "type": "string",
                "description": field.description,
            }),
            FieldKind::Milliseconds => {
                let mut property = json!({
                    "type": "number",
                    "description": format!(
                        "{} (default: {})",
                        field.description, limits.default_timeout_ms
                    ),
                    "default": limits.default_timeout_ms,
                    "exclusiveMinimum": 0,
                });
                if let (Some(max), Value::Object(object)) =
                    (limits.max_timeout_ms, &mut property)
                {
                    object.insert("maximum".to_string(), json!(max));
                }
                property
            }
        };
        properties.insert(field.name.to_string(), property);
        if field.required {
            required.push(Value::String(field.name.to_string()));
        }
    }
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
