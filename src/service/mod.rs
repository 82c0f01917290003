//! CRUD orchestration over the schema, table, form and data layers.

mod actions;
mod crud;
mod debounce;

pub use actions::{ActionView, HeaderAction, RoleAction, RowAction, CREATE_ACTION, DELETE_ACTION, EDIT_ACTION};
pub use crud::{
    CrudManager, CrudManagerBuilder, FilterBar, FilterControl, FilterInput, FormView, Notice, NoticeLevel, PageView,
    SubmitState, TableRow, TableView,
};
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
