//! Audit CRUD SDK: schema-driven forms, tables, filters and CRUD workflows over a REST API.

pub mod case;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod relation;
pub mod response;
pub mod service;
pub mod state;
pub mod table;

pub use client::{AbortController, AbortSignal, ClientSettings, DataClient, FilterSet, ReqwestTransport};
pub use config::{builtin_registry, load_from_path, resolve, FieldKind, FullConfig, ModuleRegistry, ModuleSchema};
pub use error::{ApiError, ApiErrorKind, AppError, ConfigError};
pub use form::{FormMode, FormState, RenderedField, Widget};
pub use relation::{display_value, RelationSelector, RelationValue};
pub use response::{ListPayload, Record};
pub use service::{CrudManager, HeaderAction, PageView, RowAction, TableView};
pub use state::SessionContext;
pub use table::{format_cell, generate_columns, Cell, ColumnDef};
