//! Relation resolution: fields that reference another module's records by id.

use crate::client::{AbortSignal, DataClient, FilterSet};
use crate::config::ModuleSchema;
use crate::error::ApiError;
use crate::response::{record_id, ListPayload, Record};
use serde::Serialize;
use serde_json::Value;

/// Fields tried, in order, before the module's own display field.
const DISPLAY_FIELDS: [&str; 3] = ["name", "title", "email"];

/// A stored relation value: a bare id, or the populated record the API returned.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationValue {
    Unresolved(String),
    Resolved(Record),
}

impl RelationValue {
    /// Interpret one stored value. Empty strings, nulls and id-less objects are "unassigned".
    pub fn from_value(value: &Value) -> Option<RelationValue> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(RelationValue::Unresolved(s.clone())),
            Value::Object(_) if record_id(value).is_some() => Some(RelationValue::Resolved(value.clone())),
            _ => None,
        }
    }

    /// All values of a possibly multi-valued field.
    pub fn list_from_value(value: &Value) -> Vec<RelationValue> {
        match value {
            Value::Array(items) => items.iter().filter_map(RelationValue::from_value).collect(),
            other => RelationValue::from_value(other).into_iter().collect(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            RelationValue::Unresolved(id) => Some(id.as_str()),
            RelationValue::Resolved(record) => record_id(record),
        }
    }
}

/// Display text of a related record: name, title, email, the module's display field, then the tail of its id.
pub fn display_value(record: &Record, display_field: Option<&str>) -> String {
    let mut keys: Vec<&str> = DISPLAY_FIELDS.to_vec();
    keys.extend(display_field);
    keys.into_iter()
        .find_map(|key| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| short_id(record_id(record).unwrap_or_default()))
}

/// "ID: " plus the last six characters of the id.
pub fn short_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(6)..].iter().collect();
    format!("ID: {}", tail)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationOption {
    pub id: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectorState {
    /// Options in flight; selection is disabled.
    Loading,
    Ready(Vec<RelationOption>),
    /// Fetch failed; the selector stays empty and disabled and shows the message.
    Failed(String),
}

/// What a host renders for a relation input.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectorView {
    pub multiple: bool,
    pub loading: bool,
    pub disabled: bool,
    pub error: Option<String>,
    pub options: Vec<RelationOption>,
    /// Selected items; in multi mode each is a removable chip.
    pub selected: Vec<RelationOption>,
}

impl SelectorView {
    /// Placeholder shown before a selector exists for the field.
    pub fn loading(multiple: bool) -> Self {
        SelectorView {
            multiple,
            loading: true,
            disabled: true,
            error: None,
            options: Vec::new(),
            selected: Vec::new(),
        }
    }
}

/// Searchable single- or multi-select over another module's records.
#[derive(Clone, Debug)]
pub struct RelationSelector {
    pub module: String,
    pub multiple: bool,
    display_field: Option<String>,
    state: SelectorState,
    selected: Vec<String>,
    search: String,
}

impl RelationSelector {
    /// Selector for `target`, preselected from the field's current value.
    pub fn new(target: &ModuleSchema, multiple: bool, current: &Value) -> Self {
        let selected = RelationValue::list_from_value(current)
            .iter()
            .filter_map(|v| v.id().map(str::to_string))
            .collect();
        RelationSelector {
            module: target.name.clone(),
            multiple,
            display_field: target.display_field.clone(),
            state: SelectorState::Loading,
            selected,
            search: String::new(),
        }
    }

    /// Fetch the target module's list through the data client and settle the state.
    /// A cancelled fetch leaves the selector loading.
    pub async fn load(&mut self, client: &DataClient, target: &ModuleSchema, abort: &AbortSignal) {
        self.state = SelectorState::Loading;
        let result = client.list(&target.endpoint, &FilterSet::new(), abort).await;
        self.settle(result);
    }

    pub fn settle(&mut self, result: Result<ListPayload, ApiError>) {
        self.state = match result {
            Ok(list) => SelectorState::Ready(
                list.data
                    .iter()
                    .filter_map(|r| {
                        record_id(r).map(|id| RelationOption {
                            id: id.to_string(),
                            label: display_value(r, self.display_field.as_deref()),
                        })
                    })
                    .collect(),
            ),
            Err(e) if e.is_cancelled() => SelectorState::Loading,
            Err(e) => {
                tracing::warn!(module = %self.module, error = %e, "relation options failed to load");
                SelectorState::Failed(e.message)
            }
        };
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn is_disabled(&self) -> bool {
        !matches!(self.state, SelectorState::Ready(_))
    }

    pub fn options(&self) -> &[RelationOption] {
        match &self.state {
            SelectorState::Ready(options) => options,
            _ => &[],
        }
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    /// Options whose label contains the search text, case-insensitively.
    pub fn visible_options(&self) -> Vec<RelationOption> {
        let needle = self.search.trim().to_lowercase();
        self.options()
            .iter()
            .filter(|o| needle.is_empty() || o.label.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Single mode replaces the value; multi mode toggles membership.
    /// Returns false when nothing changed (still loading, or unknown id).
    pub fn select(&mut self, id: &str) -> bool {
        if !self.options().iter().any(|o| o.id == id) {
            return false;
        }
        if self.multiple {
            if let Some(pos) = self.selected.iter().position(|s| s == id) {
                self.selected.remove(pos);
            } else {
                self.selected.push(id.to_string());
            }
        } else {
            self.selected = vec![id.to_string()];
        }
        true
    }

    /// Remove exactly one id, leaving the rest untouched.
    pub fn remove(&mut self, id: &str) {
        self.selected.retain(|s| s != id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    /// Value bound to the form: an id (or null) in single mode, an id array in multi mode.
    pub fn value(&self) -> Value {
        if self.multiple {
            Value::Array(self.selected.iter().cloned().map(Value::String).collect())
        } else {
            self.selected
                .first()
                .cloned()
                .map(Value::String)
                .unwrap_or(Value::Null)
        }
    }

    pub fn view(&self) -> SelectorView {
        let selected = self
            .selected
            .iter()
            .map(|id| RelationOption {
                id: id.clone(),
                label: self
                    .options()
                    .iter()
                    .find(|o| &o.id == id)
                    .map(|o| o.label.clone())
                    .unwrap_or_else(|| short_id(id)),
            })
            .collect();
        SelectorView {
            multiple: self.multiple,
            loading: matches!(self.state, SelectorState::Loading),
            disabled: self.is_disabled(),
            error: match &self.state {
                SelectorState::Failed(message) => Some(message.clone()),
                _ => None,
            },
            options: self.visible_options(),
            selected,
        }
    }
}
