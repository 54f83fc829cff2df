//! Table loading and the country-keyed merge

pub mod loader;
pub mod merger;

pub use loader::{load_table, load_tables, parse_csv, parse_json, LoadedTables, TableFormat};
pub use merger::{
    AliasTable, DropReason, DroppedRow, MergeOutcome, RowMerger, SourceTable, BUILTIN_ALIASES,
};
