pub mod keys;
pub mod projection;

pub use keys::KeyColumns;
pub use projection::{ColumnSet, ProjectedHeader, UpsertPolicy};
