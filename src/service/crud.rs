//! CrudManager: one module's page workflow. Permission gate, list, filter bar, form modal, delete confirmation.

use crate::case::title_case;
use crate::client::{is_temp_id, AbortController, AbortSignal, DataClient, FilterSet};
use crate::config::{Action, FilterType, ModuleRegistry, ModuleSchema};
use crate::error::{ApiError, ApiErrorKind, AppError, ConfigError};
use crate::form::{FormMode, FormState, RenderedField, SelectOption};
use crate::relation::{RelationSelector, SelectorView};
use crate::response::{record_id, ListPayload, Record};
use crate::service::actions::{ActionView, HeaderAction, RowAction, CREATE_ACTION, DELETE_ACTION, EDIT_ACTION};
use crate::service::debounce::{Debouncer, SEARCH_DEBOUNCE};
use crate::table::{format_row, generate_columns, Cell, ColumnDef};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Everything a host needs to draw the page.
#[derive(Clone, Debug, PartialEq)]
pub enum PageView {
    ConfigurationMissing { module: String },
    AccessDenied { module: String },
    NotAuthenticated,
    Loading,
    Failed { message: String, retryable: bool },
    Ready(TableView),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableView {
    pub title: String,
    pub description: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<TableRow>,
    pub count: u64,
    /// Set when the list is empty.
    pub empty_message: Option<String>,
    pub header_actions: Vec<ActionView>,
    pub filters: FilterBar,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub id: String,
    pub cells: Vec<Cell>,
    pub actions: Vec<ActionView>,
    /// A mutation for this row is in flight, or the row is an unsaved placeholder.
    pub busy: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterBar {
    pub controls: Vec<FilterControl>,
    pub clear_enabled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterControl {
    pub key: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub input: FilterInput,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterInput {
    Search { value: String },
    Select { options: Vec<SelectOption>, selected: Option<String> },
    Relation(SelectorView),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    /// Last submit failed; the message stays pinned above the submit button.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormView {
    pub title: String,
    pub mode: FormMode,
    pub record_id: Option<String>,
    pub fields: Vec<RenderedField>,
    pub submit: SubmitState,
}

impl FormView {
    pub fn submit_enabled(&self) -> bool {
        self.submit != SubmitState::Submitting
    }

    pub fn error(&self) -> Option<&str> {
        match &self.submit {
            SubmitState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient notification. Never raised for cancelled requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Default)]
enum ListState {
    #[default]
    Idle,
    Loading,
    Loaded(ListPayload),
    Failed(ApiError),
}

struct Modal {
    seq: u64,
    form: FormState,
    record_id: Option<String>,
    submit: SubmitState,
}

#[derive(Default)]
struct PageState {
    /// Applied filters, keyed by API param.
    filters: FilterSet,
    /// Raw search text per filter key, including text still waiting on the debounce.
    search_inputs: BTreeMap<String, String>,
    filter_selectors: HashMap<String, RelationSelector>,
    list: ListState,
    list_abort: Option<AbortController>,
    list_generation: u64,
    modal: Option<Modal>,
    modal_seq: u64,
    pending_delete: Option<String>,
    in_flight: HashSet<String>,
    notices: Vec<Notice>,
}

struct ManagerInner {
    module: String,
    schema: Result<Arc<ModuleSchema>, ConfigError>,
    registry: Arc<ModuleRegistry>,
    client: DataClient,
    header_actions: Vec<Arc<dyn HeaderAction>>,
    row_actions: Vec<Arc<dyn RowAction>>,
    state: Mutex<PageState>,
    search: OnceLock<Debouncer<(String, String)>>,
}

pub struct CrudManagerBuilder {
    registry: Arc<ModuleRegistry>,
    module: String,
    client: DataClient,
    header_actions: Vec<Arc<dyn HeaderAction>>,
    row_actions: Vec<Arc<dyn RowAction>>,
}

impl CrudManagerBuilder {
    pub fn header_action(mut self, action: impl HeaderAction + 'static) -> Self {
        self.header_actions.push(Arc::new(action));
        self
    }

    pub fn row_action(mut self, action: impl RowAction + 'static) -> Self {
        self.row_actions.push(Arc::new(action));
        self
    }

    pub fn build(self) -> CrudManager {
        let schema = self.registry.module(&self.module);
        if let Err(e) = &schema {
            tracing::warn!(module = %self.module, error = %e, "no schema for module");
        }
        CrudManager {
            inner: Arc::new(ManagerInner {
                module: self.module,
                schema,
                registry: self.registry,
                client: self.client,
                header_actions: self.header_actions,
                row_actions: self.row_actions,
                state: Mutex::new(PageState::default()),
                search: OnceLock::new(),
            }),
        }
    }
}

/// Cloneable handle; clones drive the same page.
#[derive(Clone)]
pub struct CrudManager {
    inner: Arc<ManagerInner>,
}

impl CrudManager {
    /// An unknown module does not fail here; the page renders `ConfigurationMissing`.
    pub fn new(registry: Arc<ModuleRegistry>, module: &str, client: DataClient) -> Self {
        Self::builder(registry, module, client).build()
    }

    pub fn builder(registry: Arc<ModuleRegistry>, module: &str, client: DataClient) -> CrudManagerBuilder {
        CrudManagerBuilder {
            registry,
            module: module.to_string(),
            client,
            header_actions: Vec::new(),
            row_actions: Vec::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.inner.module
    }

    pub fn schema(&self) -> Result<Arc<ModuleSchema>, AppError> {
        self.inner.schema.clone().map_err(AppError::from)
    }

    /// Whether the current role may perform `action`. False without a session or schema.
    pub fn allows(&self, action: Action) -> bool {
        match (&self.inner.schema, self.inner.client.session().role()) {
            (Ok(schema), Some(role)) => schema.can(action.as_str(), &role),
            _ => false,
        }
    }

    /// Load relation filter options and the first page of the list.
    pub async fn mount(&self) -> PageView {
        if let Err(e) = self.load_filter_options().await {
            tracing::debug!(module = %self.inner.module, error = %e, "filter options not loaded");
        }
        if let Err(e) = self.reload().await {
            tracing::debug!(module = %self.inner.module, error = %e, "initial list not loaded");
        }
        self.view()
    }

    /// Abort the in-flight list request, e.g. when the page goes away.
    pub fn unmount(&self) {
        if let Some(controller) = self.lock().list_abort.take() {
            controller.abort();
        }
        if let Some(search) = self.inner.search.get() {
            search.cancel();
        }
    }

    /// List with the applied filters, from cache when possible.
    pub async fn reload(&self) -> Result<(), AppError> {
        self.load_list(false).await
    }

    /// List with the applied filters, always from the network. Backs the retry affordance.
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.load_list(true).await
    }

    async fn load_list(&self, force: bool) -> Result<(), AppError> {
        let schema = self.gate(Action::View)?;
        let (filters, signal, generation) = {
            let mut state = self.lock();
            if let Some(previous) = state.list_abort.take() {
                previous.abort();
            }
            let controller = AbortController::new();
            let signal = controller.signal();
            state.list_abort = Some(controller);
            state.list_generation += 1;
            state.list = ListState::Loading;
            (state.filters.clone(), signal, state.list_generation)
        };
        let client = &self.inner.client;
        let result = if force {
            client.refetch(&schema.endpoint, &filters, &signal).await
        } else {
            client.list(&schema.endpoint, &filters, &signal).await
        };
        let mut state = self.lock();
        if state.list_generation != generation {
            return Ok(());
        }
        state.list_abort = None;
        match result {
            Ok(list) => {
                state.list = ListState::Loaded(list);
                Ok(())
            }
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                tracing::warn!(module = %schema.name, error = %e, "list failed");
                state.list = ListState::Failed(e.clone());
                Err(e.into())
            }
        }
    }

    pub fn filters(&self) -> FilterSet {
        self.lock().filters.clone()
    }

    /// Type into a search filter. The list reloads once typing pauses for the debounce period.
    pub fn set_search(&self, key: &str, text: &str) -> Result<(), AppError> {
        let schema = self.schema()?;
        let filter = schema
            .filter(key)
            .filter(|f| f.kind == FilterType::Search)
            .ok_or_else(|| AppError::NotFound(format!("search filter '{}' in {}", key, schema.name)))?;
        self.lock()
            .search_inputs
            .insert(key.to_string(), text.to_string());
        self.search_debouncer()
            .push((filter.api_param.clone(), text.to_string()));
        Ok(())
    }

    /// Apply a filter value at once. Empty and "all" remove the filter.
    pub async fn set_filter(&self, key: &str, value: &str) -> Result<(), AppError> {
        let schema = self.schema()?;
        let filter = schema
            .filter(key)
            .ok_or_else(|| AppError::NotFound(format!("filter '{}' in {}", key, schema.name)))?;
        {
            let mut state = self.lock();
            match filter.kind {
                FilterType::Search => {
                    state.search_inputs.insert(key.to_string(), value.to_string());
                    if let Some(search) = self.inner.search.get() {
                        search.cancel();
                    }
                }
                FilterType::Select => {
                    if let Some(selector) = state.filter_selectors.get_mut(key) {
                        selector.clear();
                        selector.select(value);
                    }
                }
            }
            state.filters.set(filter.api_param.clone(), value);
        }
        self.reload().await
    }

    /// Reset every filter and reload.
    pub async fn clear_filters(&self) -> Result<(), AppError> {
        if let Some(search) = self.inner.search.get() {
            search.cancel();
        }
        {
            let mut state = self.lock();
            state.filters.clear();
            state.search_inputs.clear();
            for selector in state.filter_selectors.values_mut() {
                selector.clear();
            }
        }
        self.reload().await
    }

    pub fn can_clear_filters(&self) -> bool {
        filters_active(&self.lock())
    }

    /// Fetch options for filters backed by a relation.
    pub async fn load_filter_options(&self) -> Result<(), AppError> {
        let schema = self.schema()?;
        for filter in &schema.filters {
            let Some(module) = filter.relation.as_deref() else {
                continue;
            };
            let target = self.inner.registry.module(module)?;
            let current = self
                .lock()
                .filters
                .get(&filter.api_param)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            let mut selector = RelationSelector::new(&target, false, &current);
            selector
                .load(&self.inner.client, &target, &AbortSignal::never())
                .await;
            self.lock()
                .filter_selectors
                .insert(filter.key.clone(), selector);
        }
        Ok(())
    }

    pub async fn open_create(&self) -> Result<(), AppError> {
        let schema = self.gate(Action::Create)?;
        let form = FormState::new(&self.inner.registry, schema, FormMode::Create, None)?;
        self.open_modal(form, None).await
    }

    /// Edit form for `id`, seeded from the loaded list or fetched when the row is not there.
    pub async fn open_edit(&self, id: &str) -> Result<(), AppError> {
        let schema = self.gate(Action::Edit)?;
        if is_temp_id(id) {
            return Err(AppError::Busy(format!("{} is not saved yet", id)));
        }
        let loaded = match &self.lock().list {
            ListState::Loaded(list) => list.find(id).cloned(),
            _ => None,
        };
        let record = match loaded {
            Some(record) => record,
            None => {
                self.inner
                    .client
                    .get_by_id(&schema.endpoint, id, &AbortSignal::never())
                    .await?
            }
        };
        let form = FormState::new(&self.inner.registry, schema, FormMode::Edit, Some(&record))?;
        self.open_modal(form, Some(id.to_string())).await
    }

    async fn open_modal(&self, mut form: FormState, record_id: Option<String>) -> Result<(), AppError> {
        form.load_relations(&self.inner.client, &self.inner.registry, &AbortSignal::never())
            .await;
        let mut state = self.lock();
        state.modal_seq += 1;
        let seq = state.modal_seq;
        state.modal = Some(Modal {
            seq,
            form,
            record_id,
            submit: SubmitState::Idle,
        });
        Ok(())
    }

    pub fn form_view(&self) -> Option<FormView> {
        let state = self.lock();
        let modal = state.modal.as_ref()?;
        let verb = match modal.form.mode() {
            FormMode::Create => "Create",
            FormMode::Edit => "Edit",
        };
        Some(FormView {
            title: format!("{} {}", verb, modal.form.schema().title),
            mode: modal.form.mode(),
            record_id: modal.record_id.clone(),
            fields: modal.form.render(),
            submit: modal.submit.clone(),
        })
    }

    /// Change one field of the open form.
    pub fn change(&self, key: &str, value: Value) -> Result<bool, AppError> {
        self.with_form(|form| form.change(key, value))
    }

    /// Pick a select option by its displayed label.
    pub fn choose_option_label(&self, key: &str, label: &str) -> Result<bool, AppError> {
        self.with_form(|form| form.choose_option_label(key, label))
    }

    pub fn remove_relation(&self, key: &str, id: &str) -> Result<bool, AppError> {
        self.with_form(|form| form.remove_relation(key, id))
    }

    pub fn set_relation_search(&self, key: &str, text: &str) -> Result<(), AppError> {
        self.with_form(|form| form.set_relation_search(key, text))
    }

    /// Validate, then create or update. On success the modal closes and the list reloads;
    /// on failure the modal stays open with the error pinned.
    pub async fn submit(&self) -> Result<Record, AppError> {
        let schema = self.schema()?;
        let (seq, mode, record_id, payload) = {
            let mut state = self.lock();
            let Some(modal) = state.modal.as_mut() else {
                return Err(AppError::NotFound("no form is open".to_string()));
            };
            if modal.submit == SubmitState::Submitting {
                return Err(AppError::Busy(format!("{} form is already submitting", schema.name)));
            }
            let mode = modal.form.mode();
            if !modal.form.validate() {
                return Err(AppError::Validation(modal.form.errors().clone()));
            }
            let payload = modal.form.payload();
            let record_id = modal.record_id.clone();
            let seq = modal.seq;
            self.gate(match mode {
                FormMode::Create => Action::Create,
                FormMode::Edit => Action::Edit,
            })?;
            if let Some(id) = &record_id {
                if !state.in_flight.insert(id.clone()) {
                    return Err(AppError::Busy(format!("{} is already being changed", id)));
                }
            }
            if let Some(modal) = state.modal.as_mut() {
                modal.submit = SubmitState::Submitting;
            }
            (seq, mode, record_id, payload)
        };

        let client = &self.inner.client;
        let result = match (mode, &record_id) {
            (FormMode::Edit, Some(id)) => client.update(&schema.endpoint, id, payload).await,
            _ => client.create(&schema.endpoint, payload).await,
        };

        {
            let mut state = self.lock();
            if let Some(id) = &record_id {
                state.in_flight.remove(id);
            }
            let is_current = state.modal.as_ref().map(|m| m.seq == seq).unwrap_or(false);
            match &result {
                Ok(_) => {
                    if is_current {
                        state.modal = None;
                    }
                    let verb = match mode {
                        FormMode::Create => "created",
                        FormMode::Edit => "updated",
                    };
                    state.notices.push(Notice::success(format!("{} record {}", schema.title, verb)));
                }
                Err(e) => {
                    if e.is_user_facing() {
                        tracing::warn!(module = %schema.name, error = %e, "submit failed");
                    }
                    if let Some(modal) = state.modal.as_mut().filter(|_| is_current) {
                        modal.submit = if e.is_cancelled() {
                            SubmitState::Idle
                        } else {
                            SubmitState::Failed(e.message.clone())
                        };
                    }
                }
            }
        }

        let record = result?;
        if let Err(e) = self.reload().await {
            tracing::debug!(module = %schema.name, error = %e, "reload after submit failed");
        }
        Ok(record)
    }

    pub fn close(&self) {
        self.lock().modal = None;
    }

    /// First step of a delete: remember the row until the user confirms.
    pub fn request_delete(&self, id: &str) -> Result<(), AppError> {
        self.gate(Action::Delete)?;
        self.lock().pending_delete = Some(id.to_string());
        Ok(())
    }

    pub fn pending_delete(&self) -> Option<String> {
        self.lock().pending_delete.clone()
    }

    pub fn cancel_delete(&self) {
        self.lock().pending_delete = None;
    }

    /// Delete the confirmed row. On failure the row comes back and an error notice is raised.
    pub async fn confirm_delete(&self) -> Result<(), AppError> {
        let schema = self.gate(Action::Delete)?;
        let id = {
            let mut state = self.lock();
            let id = state
                .pending_delete
                .take()
                .ok_or_else(|| AppError::NotFound("no delete awaiting confirmation".to_string()))?;
            if !state.in_flight.insert(id.clone()) {
                return Err(AppError::Busy(format!("{} is already being changed", id)));
            }
            id
        };
        let result = self.inner.client.delete(&schema.endpoint, &id).await;
        {
            let mut state = self.lock();
            state.in_flight.remove(&id);
            match &result {
                Ok(()) => state
                    .notices
                    .push(Notice::success(format!("{} record deleted", schema.title))),
                Err(e) if e.is_user_facing() => {
                    tracing::warn!(module = %schema.name, id = %id, error = %e, "delete failed");
                    state.notices.push(Notice::error(e.message.clone()));
                }
                Err(_) => {}
            }
        }
        result?;
        if let Err(e) = self.reload().await {
            tracing::debug!(module = %schema.name, error = %e, "reload after delete failed");
        }
        Ok(())
    }

    /// Drain pending notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.lock().notices)
    }

    pub fn view(&self) -> PageView {
        let schema = match &self.inner.schema {
            Ok(schema) => schema.clone(),
            Err(_) => {
                return PageView::ConfigurationMissing {
                    module: self.inner.module.clone(),
                }
            }
        };
        let session = self.inner.client.session();
        let role = match session.role() {
            Some(role) if session.is_authenticated() => role,
            _ => return PageView::NotAuthenticated,
        };
        if !schema.can(Action::View.as_str(), &role) {
            return PageView::AccessDenied {
                module: schema.name.clone(),
            };
        }
        let state = self.lock();
        let list = match &state.list {
            ListState::Idle | ListState::Loading => return PageView::Loading,
            ListState::Failed(e) => {
                return PageView::Failed {
                    message: e.message.clone(),
                    retryable: !e.is_auth() && e.kind != ApiErrorKind::MissingToken,
                }
            }
            ListState::Loaded(list) => self
                .inner
                .client
                .cached(&schema.endpoint, &state.filters)
                .unwrap_or_else(|| list.clone()),
        };
        PageView::Ready(self.table_view(&schema, &role, &state, &list))
    }

    fn table_view(&self, schema: &ModuleSchema, role: &str, state: &PageState, list: &ListPayload) -> TableView {
        let can_edit = schema.can(Action::Edit.as_str(), role);
        let can_delete = schema.can(Action::Delete.as_str(), role);
        let include_actions = can_edit || can_delete || !self.inner.row_actions.is_empty();
        let rows = list
            .data
            .iter()
            .map(|record| {
                let id = record_id(record).unwrap_or_default().to_string();
                let mut actions = Vec::new();
                if can_edit {
                    actions.push(ActionView::builtin(EDIT_ACTION, "Edit"));
                }
                if can_delete {
                    actions.push(ActionView::builtin(DELETE_ACTION, "Delete"));
                }
                actions.extend(
                    self.inner
                        .row_actions
                        .iter()
                        .filter(|a| a.visible(role, record))
                        .map(|a| ActionView::custom(a.id(), a.label())),
                );
                TableRow {
                    busy: state.in_flight.contains(&id) || is_temp_id(&id),
                    cells: format_row(&self.inner.registry, schema, record),
                    actions,
                    id,
                }
            })
            .collect();
        let mut header_actions = Vec::new();
        if schema.can(Action::Create.as_str(), role) {
            header_actions.push(ActionView::builtin(CREATE_ACTION, "Create"));
        }
        header_actions.extend(
            self.inner
                .header_actions
                .iter()
                .filter(|a| a.visible(role))
                .map(|a| ActionView::custom(a.id(), a.label())),
        );
        TableView {
            title: schema.title.clone(),
            description: schema.description.clone(),
            columns: generate_columns(schema, include_actions),
            rows,
            count: list.count,
            empty_message: (list.count == 0).then(|| format!("No {} found", schema.title.to_lowercase())),
            header_actions,
            filters: self.filter_bar(schema, state),
        }
    }

    fn filter_bar(&self, schema: &ModuleSchema, state: &PageState) -> FilterBar {
        let controls = schema
            .filters
            .iter()
            .map(|f| {
                let input = match f.kind {
                    FilterType::Search => FilterInput::Search {
                        value: state.search_inputs.get(&f.key).cloned().unwrap_or_default(),
                    },
                    FilterType::Select => match (state.filter_selectors.get(&f.key), &f.relation) {
                        (Some(selector), _) => FilterInput::Relation(selector.view()),
                        (None, Some(_)) => FilterInput::Relation(SelectorView::loading(false)),
                        (None, None) => FilterInput::Select {
                            options: f
                                .options
                                .iter()
                                .map(|o| SelectOption {
                                    value: o.clone(),
                                    label: title_case(o),
                                })
                                .collect(),
                            selected: state.filters.get(&f.api_param).map(str::to_string),
                        },
                    },
                };
                FilterControl {
                    key: f.key.clone(),
                    label: f.label.clone(),
                    placeholder: f.placeholder.clone(),
                    input,
                }
            })
            .collect();
        FilterBar {
            controls,
            clear_enabled: filters_active(state),
        }
    }

    /// Schema for `action` when the session's role may perform it.
    fn gate(&self, action: Action) -> Result<Arc<ModuleSchema>, AppError> {
        let schema = self.schema()?;
        let role = self
            .inner
            .client
            .session()
            .role()
            .ok_or_else(|| AppError::Api(ApiError::missing_token()))?;
        if !schema.can(action.as_str(), &role) {
            tracing::warn!(module = %schema.name, action = action.as_str(), role = %role, "action denied");
            return Err(AppError::PermissionDenied {
                module: schema.name.clone(),
                action: action.as_str().to_string(),
            });
        }
        Ok(schema)
    }

    fn with_form<R>(&self, f: impl FnOnce(&mut FormState) -> R) -> Result<R, AppError> {
        let mut state = self.lock();
        let modal = state
            .modal
            .as_mut()
            .ok_or_else(|| AppError::NotFound("no form is open".to_string()))?;
        if modal.submit == SubmitState::Submitting {
            return Err(AppError::Busy("form is submitting".to_string()));
        }
        Ok(f(&mut modal.form))
    }

    fn search_debouncer(&self) -> &Debouncer<(String, String)> {
        self.inner.search.get_or_init(|| {
            let weak = Arc::downgrade(&self.inner);
            Debouncer::spawn(SEARCH_DEBOUNCE, move |(param, text): (String, String)| {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    let manager = CrudManager { inner };
                    manager.lock().filters.set(param, text);
                    if let Err(e) = manager.reload().await {
                        tracing::debug!(module = %manager.inner.module, error = %e, "search reload failed");
                    }
                }
            })
        })
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn filters_active(state: &PageState) -> bool {
    !state.filters.is_empty() || state.search_inputs.values().any(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{MockTransport, Scripted};
    use crate::client::{ClientSettings, Method};
    use crate::config::builtin_registry;
    use crate::service::actions::RoleAction;
    use crate::state::SessionContext;
    use serde_json::json;
    use std::time::Duration;

    fn setup(role: &str) -> (Arc<MockTransport>, Arc<ModuleRegistry>, DataClient) {
        let mock = Arc::new(MockTransport::new());
        mock.seed(
            "problems",
            vec![
                json!({ "_id": "p1", "title": "Leaking valve", "status": "Open", "priority": "high" }),
                json!({ "_id": "p2", "title": "Broken lock", "status": "Closed", "priority": "low" }),
            ],
        );
        mock.seed("users", vec![json!({ "_id": "u1", "name": "Ann" })]);
        mock.seed("observations", vec![]);
        let registry = Arc::new(builtin_registry().expect("registry"));
        let client = DataClient::with_transport(
            mock.clone(),
            ClientSettings::default(),
            SessionContext::with_session("tok", role),
        );
        (mock, registry, client)
    }

    fn table(view: PageView) -> TableView {
        match view {
            PageView::Ready(t) => t,
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_module_renders_configuration_missing() {
        let (_mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "nope", client);
        assert_eq!(
            manager.mount().await,
            PageView::ConfigurationMissing { module: "nope".into() }
        );
        assert!(matches!(manager.open_create().await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn view_permission_failure_renders_access_denied() {
        let (mock, registry, client) = setup("viewer");
        let manager = CrudManager::new(registry, "problems", client);
        assert_eq!(
            manager.mount().await,
            PageView::AccessDenied { module: "problems".into() }
        );
        assert!(mock.requests_for(Method::Get, "problems").is_empty());
    }

    #[tokio::test]
    async fn signed_out_session_renders_not_authenticated() {
        let (_mock, registry, client) = setup("admin");
        client.session().logout();
        let manager = CrudManager::new(registry, "problems", client);
        assert_eq!(manager.mount().await, PageView::NotAuthenticated);
    }

    #[tokio::test]
    async fn non_admin_is_never_offered_delete() {
        let (mock, registry, client) = setup("auditor");
        let manager = CrudManager::new(registry, "problems", client);
        let t = table(manager.mount().await);
        assert!(t.rows.iter().all(|r| r.actions.iter().all(|a| a.id != DELETE_ACTION)));
        assert!(t.rows[0].actions.iter().any(|a| a.id == EDIT_ACTION));
        assert!(matches!(
            manager.request_delete("p1"),
            Err(AppError::PermissionDenied { .. })
        ));
        assert!(matches!(
            manager.confirm_delete().await,
            Err(AppError::PermissionDenied { .. })
        ));
        assert!(mock.requests_for(Method::Delete, "problems/p1").is_empty());
    }

    #[tokio::test]
    async fn filter_then_clear_changes_query_and_clear_control() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        assert!(!manager.can_clear_filters());

        manager.set_filter("status", "Open").await.expect("filter");
        let last = mock.requests_for(Method::Get, "problems").pop().expect("request");
        assert_eq!(last.query, vec![("status".to_string(), "Open".to_string())]);
        let t = table(manager.view());
        assert!(t.filters.clear_enabled);
        assert_eq!(t.count, 1);

        manager.clear_filters().await.expect("clear");
        let last = mock.requests_for(Method::Get, "problems").pop().expect("request");
        assert!(last.query.is_empty());
        let t = table(manager.view());
        assert!(!t.filters.clear_enabled);
        assert!(!manager.can_clear_filters());
        assert_eq!(t.count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn search_typing_is_debounced_into_one_request() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.reload().await.expect("reload");
        let before = mock.requests_for(Method::Get, "problems").len();

        for text in ["a", "ab", "abc"] {
            manager.set_search("search", text).expect("search");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let gets = mock.requests_for(Method::Get, "problems");
        assert_eq!(gets.len(), before + 1);
        assert_eq!(
            gets[before].query,
            vec![("search".to_string(), "abc".to_string())]
        );
        assert_eq!(manager.filters().get("search"), Some("abc"));
    }

    #[tokio::test]
    async fn empty_list_shows_empty_message() {
        let (_mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "observations", client);
        let t = table(manager.mount().await);
        assert_eq!(t.count, 0);
        assert_eq!(t.empty_message.as_deref(), Some("No observations found"));
    }

    #[tokio::test]
    async fn relation_filter_options_come_from_the_target_module() {
        let (_mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        let t = table(manager.mount().await);
        let assignee = t
            .filters
            .controls
            .iter()
            .find(|c| c.key == "assignedTo")
            .expect("control");
        match &assignee.input {
            FilterInput::Relation(view) => {
                assert!(!view.disabled);
                assert_eq!(view.options[0].label, "Ann");
            }
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_form_blocks_submit_without_a_request() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.open_create().await.expect("open");
        match manager.submit().await {
            Err(AppError::Validation(errors)) => assert!(errors.contains_key("title")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(mock.requests_for(Method::Post, "problems").is_empty());
        let form = manager.form_view().expect("form");
        assert!(form.submit_enabled());
        let title = form.fields.iter().find(|f| f.key == "title").expect("title");
        assert_eq!(title.error.as_deref(), Some("Problem is required"));
    }

    #[tokio::test]
    async fn failed_submit_keeps_modal_open_with_pinned_error() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.open_create().await.expect("open");
        manager.change("title", json!("Gas smell")).expect("change");
        mock.script(Scripted::Status(422, Some(json!({ "message": "Title already used" }))));
        let err = manager.submit().await.unwrap_err();
        assert_eq!(err.to_string(), "Title already used");
        let form = manager.form_view().expect("still open");
        assert_eq!(form.error(), Some("Title already used"));
        assert!(form.submit_enabled());
    }

    #[tokio::test]
    async fn successful_edit_closes_modal_and_reloads() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.mount().await;
        manager.open_edit("p1").await.expect("open");
        assert!(manager.choose_option_label("status", "In Progress").expect("choose"));
        manager.submit().await.expect("submit");
        assert!(manager.form_view().is_none());
        let patch = mock.requests_for(Method::Patch, "problems/p1").pop().expect("patch");
        assert_eq!(patch.body.as_ref().and_then(|b| b.get("status")), Some(&json!("In_Progress")));
        let t = table(manager.view());
        let row = t.rows.iter().find(|r| r.id == "p1").expect("row");
        assert_eq!(row.cells[3].to_string(), "In Progress");
        assert_eq!(manager.take_notices()[0].level, NoticeLevel::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_submitting_is_busy() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.open_create().await.expect("open");
        manager.change("title", json!("Gas smell")).expect("change");
        mock.set_delay(Duration::from_millis(200));
        let first = {
            let m = manager.clone();
            tokio::spawn(async move { m.submit().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(manager.submit().await, Err(AppError::Busy(_))));
        assert!(matches!(manager.change("title", json!("x")), Err(AppError::Busy(_))));
        first.await.expect("join").expect("submit");
        assert_eq!(mock.requests_for(Method::Post, "problems").len(), 1);
    }

    #[tokio::test]
    async fn delete_needs_confirmation_and_failures_restore_the_row() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        manager.mount().await;

        manager.request_delete("p1").expect("request");
        manager.cancel_delete();
        assert!(matches!(manager.confirm_delete().await, Err(AppError::NotFound(_))));
        assert!(mock.requests_for(Method::Delete, "problems/p1").is_empty());

        manager.request_delete("p1").expect("request");
        mock.script(Scripted::Status(409, Some(json!({ "message": "Problem has fix actions" }))));
        assert!(manager.confirm_delete().await.is_err());
        let t = table(manager.view());
        assert!(t.rows.iter().any(|r| r.id == "p1"));
        let notices = manager.take_notices();
        assert_eq!(notices, vec![Notice::error("Problem has fix actions")]);

        manager.request_delete("p1").expect("request");
        manager.confirm_delete().await.expect("delete");
        let t = table(manager.view());
        assert!(t.rows.iter().all(|r| r.id != "p1"));
        assert_eq!(t.count, 1);
    }

    #[tokio::test]
    async fn failed_list_offers_retry() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        mock.script(Scripted::Status(404, Some(json!({ "message": "No such collection" }))));
        assert!(manager.reload().await.is_err());
        assert_eq!(
            manager.view(),
            PageView::Failed {
                message: "No such collection".into(),
                retryable: true
            }
        );
        manager.refresh().await.expect("retry");
        assert!(matches!(manager.view(), PageView::Ready(_)));
    }

    #[tokio::test]
    async fn custom_actions_follow_role_and_record() {
        let (_mock, registry, client) = setup("admin");
        let manager = CrudManager::builder(registry, "problems", client)
            .header_action(RoleAction::new("export", "Export", &["admin"]))
            .row_action(RoleAction::new("escalate", "Escalate", &["admin"]).when("status", "Open"))
            .build();
        let t = table(manager.mount().await);
        let ids: Vec<&str> = t.header_actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![CREATE_ACTION, "export"]);
        let p1 = t.rows.iter().find(|r| r.id == "p1").expect("p1");
        let p2 = t.rows.iter().find(|r| r.id == "p2").expect("p2");
        assert!(p1.actions.iter().any(|a| a.id == "escalate" && a.custom));
        assert!(p2.actions.iter().all(|a| a.id != "escalate"));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_list_request_does_not_overwrite_newer_results() {
        let (mock, registry, client) = setup("admin");
        let manager = CrudManager::new(registry, "problems", client);
        mock.set_delay(Duration::from_millis(100));
        let stale = {
            let m = manager.clone();
            tokio::spawn(async move { m.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.set_filter("status", "Closed").await.expect("filter");
        stale.await.expect("join").expect("stale reload");
        let t = table(manager.view());
        assert_eq!(t.count, 1);
        assert_eq!(t.rows[0].id, "p2");
    }
}
