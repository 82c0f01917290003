//! Schema-driven forms: render fields, coerce changes, validate, and build the submit payload.

pub mod renderer;
pub mod validation;
pub mod widget;

pub use renderer::{coerce_bool, date_input_value, option_label, render_field, select_options};
pub use validation::{is_empty_value, validate_field, FormValidator};
pub use widget::{FormMode, InputKind, RenderedField, SelectOption, Widget, TEXTAREA_ROWS};

use crate::client::{AbortSignal, DataClient};
use crate::config::{FieldKind, ModuleRegistry, ModuleSchema};
use crate::error::{ConfigError, FieldErrors};
use crate::relation::{RelationSelector, RelationValue};
use crate::response::Record;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Values bound to one form instance. Holds no state beyond the values, their errors and relation selectors.
#[derive(Clone, Debug)]
pub struct FormState {
    schema: Arc<ModuleSchema>,
    mode: FormMode,
    values: Map<String, Value>,
    errors: FieldErrors,
    relations: HashMap<String, RelationSelector>,
}

impl FormState {
    /// Build a form for `schema`. Create mode starts from field defaults; edit mode from `initial`.
    pub fn new(
        registry: &ModuleRegistry,
        schema: Arc<ModuleSchema>,
        mode: FormMode,
        initial: Option<&Record>,
    ) -> Result<Self, ConfigError> {
        let mut values = Map::new();
        let mut relations = HashMap::new();
        for field in &schema.fields {
            let raw = initial
                .and_then(|r| r.get(&field.key))
                .cloned()
                .or_else(|| match mode {
                    FormMode::Create => field.default.clone(),
                    FormMode::Edit => None,
                })
                .unwrap_or(Value::Null);
            let value = match &field.kind {
                FieldKind::Relation { module, multiple } => {
                    let target = registry.module(module)?;
                    let selector = RelationSelector::new(&target, *multiple, &raw);
                    let v = selector.value();
                    relations.insert(field.key.clone(), selector);
                    v
                }
                FieldKind::Date => match date_input_value(&raw) {
                    d if d.is_empty() => Value::Null,
                    d => Value::String(d),
                },
                _ => raw,
            };
            if !value.is_null() {
                values.insert(field.key.clone(), value);
            }
        }
        Ok(FormState {
            schema,
            mode,
            values,
            errors: FieldErrors::new(),
            relations,
        })
    }

    pub fn schema(&self) -> &ModuleSchema {
        &self.schema
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn value(&self, key: &str) -> &Value {
        self.values.get(key).unwrap_or(&Value::Null)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn relation(&self, key: &str) -> Option<&RelationSelector> {
        self.relations.get(key)
    }

    /// Load options for every relation field through the data client.
    pub async fn load_relations(&mut self, client: &DataClient, registry: &ModuleRegistry, abort: &AbortSignal) {
        for selector in self.relations.values_mut() {
            match registry.module(&selector.module) {
                Ok(target) => selector.load(client, &target, abort).await,
                Err(e) => selector.settle(Err(crate::error::ApiError::decode(e.to_string()))),
            }
        }
    }

    /// Apply a change from the widget of `key`, coerced to the field's kind.
    /// Returns false for unknown, read-only or hidden fields and rejected relation ids.
    pub fn change(&mut self, key: &str, raw: Value) -> bool {
        let Some(field) = self.schema.field(key) else {
            return false;
        };
        if field.read_only || (self.mode == FormMode::Edit && field.create_only) {
            return false;
        }
        let value = match &field.kind {
            FieldKind::Switch => Value::Bool(coerce_bool(&raw)),
            FieldKind::Number => coerce_number(raw),
            FieldKind::Relation { .. } => {
                let Some(selector) = self.relations.get_mut(key) else {
                    return false;
                };
                match RelationValue::from_value(&raw) {
                    Some(v) => match v.id() {
                        Some(id) if selector.select(id) => {}
                        _ => return false,
                    },
                    None => selector.clear(),
                }
                selector.value()
            }
            FieldKind::Text
            | FieldKind::Email
            | FieldKind::Password
            | FieldKind::Select { .. }
            | FieldKind::TextArea
            | FieldKind::Date => raw,
        };
        self.set(key, value);
        true
    }

    /// Pick a select option by its displayed label; the stored value is the raw option.
    pub fn choose_option_label(&mut self, key: &str, label: &str) -> bool {
        let option = match self.schema.field(key) {
            Some(field) => match &field.kind {
                FieldKind::Select { options } => options
                    .iter()
                    .find(|o| option_label(field, o) == label)
                    .cloned(),
                _ => None,
            },
            None => None,
        };
        match option {
            Some(o) => self.change(key, Value::String(o)),
            None => false,
        }
    }

    /// Remove one chip from a multi-select relation.
    pub fn remove_relation(&mut self, key: &str, id: &str) -> bool {
        let Some(selector) = self.relations.get_mut(key) else {
            return false;
        };
        selector.remove(id);
        let value = selector.value();
        self.set(key, value);
        true
    }

    pub fn set_relation_search(&mut self, key: &str, text: &str) {
        if let Some(selector) = self.relations.get_mut(key) {
            selector.set_search(text);
        }
    }

    /// Widgets for every field shown in this mode, in schema order.
    pub fn render(&self) -> Vec<RenderedField> {
        self.schema
            .fields
            .iter()
            .filter_map(|f| {
                render_field(
                    f,
                    self.value(&f.key),
                    self.mode,
                    self.relations.get(&f.key),
                    self.errors.get(&f.key).map(String::as_str),
                )
            })
            .collect()
    }

    /// Run validation and keep the messages. True when the form may be submitted.
    pub fn validate(&mut self) -> bool {
        self.errors = FormValidator::validate(&self.schema, &self.values, self.mode);
        self.errors.is_empty()
    }

    /// Body for create/update: read-only fields never, create-only fields only when creating, nulls dropped.
    pub fn payload(&self) -> Map<String, Value> {
        self.schema
            .fields
            .iter()
            .filter(|f| !f.read_only)
            .filter(|f| !(self.mode == FormMode::Edit && f.create_only))
            .filter_map(|f| {
                self.values
                    .get(&f.key)
                    .filter(|v| !v.is_null())
                    .map(|v| (f.key.clone(), v.clone()))
            })
            .collect()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.errors.remove(key);
        if value.is_null() {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_string(), value);
        }
    }
}

/// Numeric strings become numbers; blanks become null; anything else is kept for validation to flag.
fn coerce_number(raw: Value) -> Value {
    match raw {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                Value::Number(i.into())
            } else {
                t.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::String(s))
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_registry;
    use crate::response::ListPayload;
    use serde_json::json;

    fn form(module: &str, mode: FormMode, initial: Option<Value>) -> FormState {
        let registry = builtin_registry().expect("registry");
        let schema = registry.module(module).expect("module");
        FormState::new(&registry, schema, mode, initial.as_ref()).expect("form")
    }

    #[test]
    fn edit_form_never_emits_create_only_fields() {
        let initial = json!({ "_id": "u1", "name": "Jane", "email": "jane@x.com", "password": "hash", "role": "auditor" });
        let f = form("users", FormMode::Edit, Some(initial));
        assert!(f.render().iter().all(|r| r.key != "password"));
        assert!(!f.payload().contains_key("password"));
        let mut f = f;
        assert!(!f.change("password", json!("new-secret")));
    }

    #[test]
    fn read_only_values_are_not_submitted() {
        let initial = json!({ "_id": "u1", "name": "Jane", "lastLogin": "2024-01-02T00:00:00Z" });
        let f = form("users", FormMode::Edit, Some(initial));
        assert_eq!(f.value("lastLogin"), &json!("2024-01-02"));
        assert!(!f.payload().contains_key("lastLogin"));
    }

    #[test]
    fn chosen_label_submits_raw_option() {
        let mut f = form("users", FormMode::Create, None);
        assert!(f.choose_option_label("role", "Audit Manager"));
        assert_eq!(f.payload().get("role"), Some(&json!("audit_manager")));
        assert!(!f.choose_option_label("role", "Space Cadet"));
    }

    #[test]
    fn submit_is_blocked_until_required_fields_are_filled() {
        let mut f = form("users", FormMode::Create, None);
        assert!(!f.validate());
        assert!(f.errors().contains_key("name"));
        let rendered = f.render();
        let name = rendered.iter().find(|r| r.key == "name").expect("name");
        assert_eq!(name.error.as_deref(), Some("Full Name is required"));

        f.change("name", json!("Jane"));
        assert!(!f.errors().contains_key("name"));
        f.change("email", json!("jane@x.com"));
        f.change("password", json!("secret123"));
        f.change("role", json!("auditor"));
        assert!(f.validate());
        assert_eq!(
            Value::Object(f.payload()),
            json!({ "name": "Jane", "email": "jane@x.com", "password": "secret123", "role": "auditor" })
        );
    }

    #[test]
    fn defaults_seed_create_forms_only() {
        let f = form("groups", FormMode::Create, None);
        assert_eq!(f.value("status"), &json!("active"));
        let f = form("groups", FormMode::Edit, Some(json!({ "_id": "g1", "name": "Ops" })));
        assert_eq!(f.value("status"), &Value::Null);
    }

    #[test]
    fn populated_relation_submits_its_id() {
        let initial = json!({ "_id": "p1", "title": "Leak", "status": "Open",
                              "assignedTo": { "_id": "u7", "name": "Ann" } });
        let f = form("problems", FormMode::Edit, Some(initial));
        assert_eq!(f.payload().get("assignedTo"), Some(&json!("u7")));
    }

    #[test]
    fn relation_changes_go_through_the_selector() {
        let mut f = form("groups", FormMode::Create, None);
        assert!(!f.change("members", json!("u1")));
        if let Some(selector) = f.relations.get_mut("members") {
            selector.settle(Ok(ListPayload::new(vec![
                json!({ "_id": "u1", "name": "Ann" }),
                json!({ "_id": "u2", "name": "Bo" }),
            ])));
        }
        assert!(f.change("members", json!("u1")));
        assert!(f.change("members", json!("u2")));
        assert!(f.remove_relation("members", "u1"));
        assert_eq!(f.payload().get("members"), Some(&json!(["u2"])));
    }

    #[test]
    fn switch_and_number_values_are_coerced() {
        let mut f = form("questions", FormMode::Create, None);
        f.change("isMandatory", json!("on"));
        f.change("weight", json!("3"));
        assert_eq!(f.value("isMandatory"), &json!(true));
        assert_eq!(f.value("weight"), &json!(3));
        f.change("weight", json!(""));
        assert_eq!(f.value("weight"), &Value::Null);
    }
}
