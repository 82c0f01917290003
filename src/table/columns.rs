//! Column generation and per-kind cell formatting.

use crate::case::title_case;
use crate::config::{BadgeColor, FieldDescriptor, FieldKind, ModuleRegistry, ModuleSchema};
use crate::relation::{display_value, RelationValue};
use crate::response::Record;
use crate::table::colors::badge_color;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const ACTIONS_COLUMN: &str = "actions";
/// Multi-line text longer than this is cut in table cells.
pub const TRUNCATE_AT: usize = 50;
pub const NOT_AVAILABLE: &str = "N/A";
pub const NEVER: &str = "Never";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub key: String,
    pub header: String,
    /// The appended row-actions column; it has no field behind it.
    pub actions: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cell {
    Badge { label: String, color: BadgeColor },
    /// Display values of populated relation records.
    Pills { labels: Vec<String> },
    /// `text` is cut; `full` is kept for hover.
    Truncated { text: String, full: String },
    Date { text: String },
    Never,
    Mailto { address: String, href: String },
    Text { text: String },
    NotAvailable,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Badge { label, .. } => write!(f, "{}", label),
            Cell::Pills { labels } => write!(f, "{}", labels.join(", ")),
            Cell::Truncated { text, .. } => write!(f, "{}", text),
            Cell::Date { text } => write!(f, "{}", text),
            Cell::Never => write!(f, "{}", NEVER),
            Cell::Mailto { address, .. } => write!(f, "{}", address),
            Cell::Text { text } => write!(f, "{}", text),
            Cell::NotAvailable => write!(f, "{}", NOT_AVAILABLE),
        }
    }
}

/// One column per `tableColumn` field in declaration order, plus the actions column when asked for.
pub fn generate_columns(schema: &ModuleSchema, include_actions: bool) -> Vec<ColumnDef> {
    let mut columns: Vec<ColumnDef> = schema
        .table_fields()
        .map(|f| ColumnDef {
            key: f.key.clone(),
            header: f.label.clone(),
            actions: false,
        })
        .collect();
    if include_actions {
        columns.push(ColumnDef {
            key: ACTIONS_COLUMN.to_string(),
            header: "Actions".to_string(),
            actions: true,
        });
    }
    columns
}

/// Cells of one record, aligned with `generate_columns(schema, false)`.
/// Relation cells use the target module's display field from `registry`.
pub fn format_row(registry: &ModuleRegistry, schema: &ModuleSchema, record: &Record) -> Vec<Cell> {
    schema
        .table_fields()
        .map(|f| {
            let display_field = f
                .relation()
                .and_then(|m| registry.module(m).ok())
                .and_then(|target| target.display_field.clone());
            format_cell_with(f, record.get(&f.key).unwrap_or(&Value::Null), display_field.as_deref())
        })
        .collect()
}

pub fn format_cell(field: &FieldDescriptor, value: &Value) -> Cell {
    format_cell_with(field, value, None)
}

/// `display_field` is the related module's own display text key, if any.
pub fn format_cell_with(field: &FieldDescriptor, value: &Value, display_field: Option<&str>) -> Cell {
    match &field.kind {
        FieldKind::Relation { .. } => relation_cell(value, display_field),
        FieldKind::Select { .. } => match scalar_text(value) {
            Some(s) => badge(field, &s),
            None => Cell::NotAvailable,
        },
        FieldKind::Switch => match value {
            Value::Null => Cell::NotAvailable,
            Value::Bool(b) => badge(field, if *b { "true" } else { "false" }),
            other => match scalar_text(other) {
                Some(s) => badge(field, &s),
                None => Cell::NotAvailable,
            },
        },
        FieldKind::TextArea => match scalar_text(value) {
            Some(s) => truncate(&s),
            None => Cell::NotAvailable,
        },
        FieldKind::Date => match scalar_text(value) {
            Some(s) => format_date(&s).map(|text| Cell::Date { text }).unwrap_or(Cell::Text { text: s }),
            None => Cell::Never,
        },
        FieldKind::Email => match scalar_text(value) {
            Some(s) => Cell::Mailto {
                href: format!("mailto:{}", s),
                address: s,
            },
            None => Cell::NotAvailable,
        },
        FieldKind::Text | FieldKind::Password | FieldKind::Number => match scalar_text(value) {
            Some(text) => Cell::Text { text },
            None => Cell::NotAvailable,
        },
    }
}

/// Populated records become pills; bare ids have nothing to show.
fn relation_cell(value: &Value, display_field: Option<&str>) -> Cell {
    let labels: Vec<String> = RelationValue::list_from_value(value)
        .into_iter()
        .filter_map(|v| match v {
            RelationValue::Resolved(record) => Some(display_value(&record, display_field)),
            RelationValue::Unresolved(_) => None,
        })
        .collect();
    if labels.is_empty() {
        Cell::NotAvailable
    } else {
        Cell::Pills { labels }
    }
}

fn badge(field: &FieldDescriptor, value: &str) -> Cell {
    Cell::Badge {
        label: field
            .value_labels
            .get(value)
            .cloned()
            .unwrap_or_else(|| title_case(value)),
        color: badge_color(field, value),
    }
}

fn truncate(s: &str) -> Cell {
    if s.chars().count() <= TRUNCATE_AT {
        return Cell::Text { text: s.to_string() };
    }
    let cut: String = s.chars().take(TRUNCATE_AT).collect();
    Cell::Truncated {
        text: format!("{}...", cut),
        full: s.to_string(),
    }
}

/// `M/D/YYYY`, from an RFC 3339 timestamp or a leading `YYYY-MM-DD`.
pub fn format_date(s: &str) -> Option<String> {
    let date = match chrono::DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.date_naive(),
        Err(_) => chrono::NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()?,
    };
    Some(date.format("%-m/%-d/%Y").to_string())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
