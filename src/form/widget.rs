//! Rendered form output: plain data a host turns into inputs.

use crate::relation::SelectorView;
use serde::Serialize;

/// Rows shown by multi-line inputs.
pub const TEXTAREA_ROWS: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Email,
    Password,
    Number,
    /// Date only, `YYYY-MM-DD`.
    Date,
}

/// One dropdown entry. `value` is submitted; `label` is cosmetic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Widget {
    Input { kind: InputKind, value: String },
    Select { options: Vec<SelectOption>, selected: Option<String> },
    TextArea { value: String, rows: u8 },
    Switch { checked: bool },
    Relation(SelectorView),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedField {
    pub key: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub description: Option<String>,
    /// Show the required marker.
    pub required: bool,
    pub disabled: bool,
    pub widget: Widget,
    /// Field-scoped validation message, rendered next to the input.
    pub error: Option<String>,
}
