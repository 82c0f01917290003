//! Field renderer: one descriptor plus its current value becomes one widget.

use crate::case::title_case;
use crate::config::{FieldDescriptor, FieldKind};
use crate::form::widget::{FormMode, InputKind, RenderedField, SelectOption, Widget, TEXTAREA_ROWS};
use crate::relation::{RelationSelector, SelectorView};
use serde_json::Value;

/// Render one field. Create-only fields render nothing in edit mode.
/// `selector` is the loaded relation selector for relation fields.
pub fn render_field(
    field: &FieldDescriptor,
    value: &Value,
    mode: FormMode,
    selector: Option<&RelationSelector>,
    error: Option<&str>,
) -> Option<RenderedField> {
    if mode == FormMode::Edit && field.create_only {
        return None;
    }
    let widget = match &field.kind {
        FieldKind::Text => input(InputKind::Text, value),
        FieldKind::Email => input(InputKind::Email, value),
        FieldKind::Password => input(InputKind::Password, value),
        FieldKind::Number => input(InputKind::Number, value),
        FieldKind::Date => Widget::Input {
            kind: InputKind::Date,
            value: date_input_value(value),
        },
        FieldKind::Select { options } => Widget::Select {
            options: select_options(options, field),
            selected: value.as_str().map(str::to_string),
        },
        FieldKind::TextArea => Widget::TextArea {
            value: text_value(value),
            rows: TEXTAREA_ROWS,
        },
        FieldKind::Switch => Widget::Switch {
            checked: coerce_bool(value),
        },
        FieldKind::Relation { multiple, .. } => Widget::Relation(
            selector
                .map(RelationSelector::view)
                .unwrap_or_else(|| SelectorView::loading(*multiple)),
        ),
    };
    let disabled = field.read_only
        || matches!(&widget, Widget::Relation(view) if view.disabled);
    Some(RenderedField {
        key: field.key.clone(),
        label: field.label.clone(),
        placeholder: field.placeholder.clone(),
        description: field.description.clone(),
        required: field.required,
        disabled,
        widget,
        error: error.map(str::to_string),
    })
}

/// Dropdown entries: value kept verbatim, label from `valueLabels` or title-cased.
pub fn select_options(options: &[String], field: &FieldDescriptor) -> Vec<SelectOption> {
    options
        .iter()
        .map(|o| SelectOption {
            value: o.clone(),
            label: option_label(field, o),
        })
        .collect()
}

pub fn option_label(field: &FieldDescriptor, value: &str) -> String {
    field
        .value_labels
        .get(value)
        .cloned()
        .unwrap_or_else(|| title_case(value))
}

/// Checkbox semantics: booleans as-is, "true"/"on"/"1"/"yes" and non-zero numbers are checked.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "on" | "1" | "yes"),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// `YYYY-MM-DD` from a date or timestamp string; other values render empty.
pub fn date_input_value(value: &Value) -> String {
    let Some(s) = value.as_str() else {
        return String::new();
    };
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    match s.get(..10).map(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        Some(Ok(d)) => d.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

fn input(kind: InputKind, value: &Value) -> Widget {
    Widget::Input {
        kind,
        value: text_value(value),
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
