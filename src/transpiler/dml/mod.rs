//! DML statement builders.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::build_delete;
pub use insert::build_insert;
pub use select::{build_aggregate, build_exists, build_select};
pub use update::{build_replace, build_update, Replacement};
