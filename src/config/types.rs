//! Raw module config types matching the JSON registry (`modules.json`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared field type. Unknown strings deserialize to `Other` and resolve to a text input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Password,
    Select,
    Textarea,
    Switch,
    Date,
    Number,
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Search,
    Select,
}

/// Badge colors available to table cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Green,
    Red,
    Yellow,
    Blue,
    Purple,
    Orange,
    Indigo,
    Gray,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub key: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    /// Name of the module this field references.
    #[serde(default)]
    pub relation: Option<String>,
    /// Relation holds a list of ids instead of one.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub table_column: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub create_only: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub color_map: HashMap<String, BadgeColor>,
    #[serde(default)]
    pub value_labels: HashMap<String, String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub key: String,
    #[serde(rename = "type")]
    pub type_: FilterType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Query string key; defaults to the filter key.
    #[serde(default)]
    pub api_param: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub relation: Option<String>,
    /// Local fields a search conceptually covers. Informational; filtering happens server side.
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Module-specific text field used when a record has no name, title or email.
    #[serde(default)]
    pub display_field: Option<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    /// action -> roles allowed to perform it.
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
}

/// All module configs in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub modules: Vec<ModuleConfig>,
}
