//! Config validation: referential integrity and per-module consistency.

use crate::config::{FieldType, FilterType, FullConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let module_names: HashSet<&str> = config.modules.iter().map(|m| m.name.as_str()).collect();

    let mut seen = HashSet::new();
    for m in &config.modules {
        if m.name.trim().is_empty() {
            return Err(ConfigError::Validation("module name must not be empty".into()));
        }
        if !seen.insert(m.name.as_str()) {
            return Err(ConfigError::DuplicateModule(m.name.clone()));
        }
        if m.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "module {} has an empty endpoint",
                m.name
            )));
        }

        let mut field_keys = HashSet::new();
        for f in &m.fields {
            if !field_keys.insert(f.key.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    module: m.name.clone(),
                    kind: "field",
                    key: f.key.clone(),
                });
            }
            if let Some(rel) = &f.relation {
                if !module_names.contains(rel.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "module",
                        id: format!("{} (field {}.{})", rel, m.name, f.key),
                    });
                }
            } else if f.type_ == FieldType::Select && f.options.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "select field {}.{} requires options",
                    m.name, f.key
                )));
            }
            if let Some(pattern) = f.validation.as_ref().and_then(|r| r.pattern.as_deref()) {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("invalid pattern for {}.{}: {}", m.name, f.key, e))
                })?;
            }
        }

        let mut filter_keys = HashSet::new();
        for flt in &m.filters {
            if !filter_keys.insert(flt.key.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    module: m.name.clone(),
                    kind: "filter",
                    key: flt.key.clone(),
                });
            }
            if let Some(rel) = &flt.relation {
                if !module_names.contains(rel.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "module",
                        id: format!("{} (filter {}.{})", rel, m.name, flt.key),
                    });
                }
            }
            if flt.type_ == FilterType::Select && flt.options.is_empty() && flt.relation.is_none() {
                return Err(ConfigError::Validation(format!(
                    "select filter {}.{} requires options or a relation",
                    m.name, flt.key
                )));
            }
        }
    }

    Ok(())
}
