//! Load module config from the built-in registry or a JSON file, and resolve it for runtime use.

use crate::case::humanize_key;
use crate::config::resolved::{
    FieldDescriptor, FieldKind, FilterDescriptor, ModuleRegistry, ModuleSchema, Permissions,
};
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_MODULES: &str = include_str!("../../config/modules.json");

/// Parse the built-in audit module registry.
pub fn builtin_config() -> Result<FullConfig, ConfigError> {
    parse_config(BUILTIN_MODULES)
}

/// Parse, validate and resolve the built-in registry.
pub fn builtin_registry() -> Result<ModuleRegistry, ConfigError> {
    resolve(&builtin_config()?)
}

pub fn parse_config(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Load a registry file (same shape as the built-in `modules.json`).
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading module config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_config(&raw)
}

/// Build the resolved registry from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ModuleRegistry, ConfigError> {
    validate(config)?;

    let mut modules = Vec::with_capacity(config.modules.len());
    let mut module_by_name = HashMap::new();

    for m in &config.modules {
        let fields = m.fields.iter().map(|f| resolve_field(&m.name, f)).collect();
        let filters = m.filters.iter().map(resolve_filter).collect();
        let permissions = Permissions::new(
            m.permissions
                .iter()
                .map(|(action, roles)| (action.clone(), roles.iter().cloned().collect::<HashSet<_>>()))
                .collect(),
        );
        let schema = Arc::new(ModuleSchema {
            name: m.name.clone(),
            endpoint: m.endpoint.trim_matches('/').to_string(),
            title: if m.title.is_empty() { humanize_key(&m.name) } else { m.title.clone() },
            description: m.description.clone(),
            display_field: m.display_field.clone(),
            fields,
            filters,
            permissions,
        });
        module_by_name.insert(m.name.clone(), schema.clone());
        modules.push(schema);
    }

    tracing::info!(modules = modules.len(), "module registry resolved");
    Ok(ModuleRegistry {
        modules,
        module_by_name,
    })
}

fn resolve_field(module: &str, f: &FieldConfig) -> FieldDescriptor {
    let kind = match (&f.relation, f.type_) {
        (Some(rel), _) => FieldKind::Relation {
            module: rel.clone(),
            multiple: f.multiple,
        },
        (None, FieldType::Text) => FieldKind::Text,
        (None, FieldType::Email) => FieldKind::Email,
        (None, FieldType::Password) => FieldKind::Password,
        (None, FieldType::Select) => FieldKind::Select {
            options: f.options.clone(),
        },
        (None, FieldType::Textarea) => FieldKind::TextArea,
        (None, FieldType::Switch) => FieldKind::Switch,
        (None, FieldType::Date) => FieldKind::Date,
        (None, FieldType::Number) => FieldKind::Number,
        (None, FieldType::Other) => {
            tracing::warn!(module, field = %f.key, "unknown field type, using text input");
            FieldKind::Text
        }
    };
    FieldDescriptor {
        key: f.key.clone(),
        kind,
        label: f.label.clone().unwrap_or_else(|| humanize_key(&f.key)),
        placeholder: f.placeholder.clone(),
        description: f.description.clone(),
        required: f.required,
        table_column: f.table_column,
        filterable: f.filterable,
        create_only: f.create_only,
        read_only: f.read_only,
        default: f.default.clone(),
        color_map: f.color_map.clone(),
        value_labels: f.value_labels.clone(),
        validation: f.validation.clone(),
    }
}

fn resolve_filter(f: &FilterConfig) -> FilterDescriptor {
    FilterDescriptor {
        key: f.key.clone(),
        kind: f.type_,
        label: f.label.clone().unwrap_or_else(|| humanize_key(&f.key)),
        placeholder: f.placeholder.clone(),
        api_param: f.api_param.clone().unwrap_or_else(|| f.key.clone()),
        options: f.options.clone(),
        relation: f.relation.clone(),
        fields: f.fields.clone(),
    }
}
