//! Extension points for module-specific actions ("Generate Report", "Upload Proof", ...).
//! The host registers them; the orchestrator only decides where they show up.

use crate::response::Record;
use serde::Serialize;

pub const CREATE_ACTION: &str = "create";
pub const EDIT_ACTION: &str = "edit";
pub const DELETE_ACTION: &str = "delete";

/// Page-level action shown next to "Create".
pub trait HeaderAction: Send + Sync {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn visible(&self, _role: &str) -> bool {
        true
    }
}

/// Per-row action shown next to "Edit" and "Delete".
pub trait RowAction: Send + Sync {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn visible(&self, _role: &str, _record: &Record) -> bool {
        true
    }
}

/// An action as the host renders it. `custom` is false for create/edit/delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionView {
    pub id: String,
    pub label: String,
    pub custom: bool,
}

impl ActionView {
    pub(crate) fn builtin(id: &str, label: &str) -> Self {
        ActionView {
            id: id.to_string(),
            label: label.to_string(),
            custom: false,
        }
    }

    pub(crate) fn custom(id: &str, label: &str) -> Self {
        ActionView {
            id: id.to_string(),
            label: label.to_string(),
            custom: true,
        }
    }
}

/// Action restricted to a fixed set of roles, optionally only for records whose `field` equals `equals`.
#[derive(Clone, Debug)]
pub struct RoleAction {
    pub id: String,
    pub label: String,
    pub roles: Vec<String>,
    pub when: Option<(String, String)>,
}

impl RoleAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>, roles: &[&str]) -> Self {
        RoleAction {
            id: id.into(),
            label: label.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            when: None,
        }
    }

    /// Show the row action only when `record[field] == value`.
    pub fn when(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.when = Some((field.into(), value.into()));
        self
    }

    fn role_allowed(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl HeaderAction for RoleAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn visible(&self, role: &str) -> bool {
        self.role_allowed(role)
    }
}

impl RowAction for RoleAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn visible(&self, role: &str, record: &Record) -> bool {
        if !self.role_allowed(role) {
            return false;
        }
        match &self.when {
            Some((field, value)) => record.get(field).and_then(|v| v.as_str()) == Some(value.as_str()),
            None => true,
        }
    }
}
