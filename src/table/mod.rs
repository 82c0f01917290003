//! Schema-driven tables.

pub mod colors;
pub mod columns;

pub use colors::{badge_color, status_color};
pub use columns::{
    format_cell, format_cell_with, format_date, format_row, generate_columns, Cell, ColumnDef, ACTIONS_COLUMN, NEVER,
    NOT_AVAILABLE, TRUNCATE_AT,
};
