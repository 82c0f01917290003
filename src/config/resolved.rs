//! Resolved module registry: config validated and flattened for runtime use.

use crate::config::{BadgeColor, FilterType, ValidationRule};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What a field holds and how it is edited. Renderer, validator and column formatter all match on this.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Select { options: Vec<String> },
    TextArea,
    Switch,
    Date,
    Number,
    /// Id reference into another module, regardless of the declared type.
    Relation { module: String, multiple: bool },
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub key: String,
    pub kind: FieldKind,
    pub label: String,
    pub placeholder: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub table_column: bool,
    pub filterable: bool,
    pub create_only: bool,
    pub read_only: bool,
    pub default: Option<serde_json::Value>,
    pub color_map: HashMap<String, BadgeColor>,
    pub value_labels: HashMap<String, String>,
    pub validation: Option<ValidationRule>,
}

impl FieldDescriptor {
    pub fn relation(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { module, .. } => Some(module.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FilterDescriptor {
    pub key: String,
    pub kind: FilterType,
    pub label: String,
    pub placeholder: Option<String>,
    pub api_param: String,
    pub options: Vec<String>,
    pub relation: Option<String>,
    pub fields: Vec<String>,
}

/// Core actions checked by the orchestrator. Schemas may declare others (e.g. "generate").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Permissions {
    by_action: HashMap<String, HashSet<String>>,
}

impl Permissions {
    pub fn new(by_action: HashMap<String, HashSet<String>>) -> Self {
        Permissions { by_action }
    }

    /// Role is allowed only when the action lists it. Undeclared actions allow nobody.
    pub fn allows(&self, action: &str, role: &str) -> bool {
        self.by_action
            .get(action)
            .map(|roles| roles.contains(role))
            .unwrap_or(false)
    }

    pub fn roles(&self, action: &str) -> Option<&HashSet<String>> {
        self.by_action.get(action)
    }
}

#[derive(Clone, Debug)]
pub struct ModuleSchema {
    pub name: String,
    pub endpoint: String,
    pub title: String,
    pub description: String,
    pub display_field: Option<String>,
    /// Declaration order is display order.
    pub fields: Vec<FieldDescriptor>,
    pub filters: Vec<FilterDescriptor>,
    pub permissions: Permissions,
}

impl ModuleSchema {
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn filter(&self, key: &str) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|f| f.key == key)
    }

    pub fn table_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.table_column)
    }

    pub fn can(&self, action: &str, role: &str) -> bool {
        self.permissions.allows(action, role)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    pub modules: Vec<Arc<ModuleSchema>>,
    pub module_by_name: HashMap<String, Arc<ModuleSchema>>,
}

impl ModuleRegistry {
    pub fn module(&self, name: &str) -> Result<Arc<ModuleSchema>, ConfigError> {
        self.module_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownModule(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
