//! Core abstractions for database-agnostic conversion.
//!
//! - [`schema`]: reflected table and column metadata
//! - [`value`]: owned SQL values
//! - [`row`]: ordered field → value rows
//! - [`traits`]: the catalog and destination-session traits drivers implement
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod row;
pub mod schema;
pub mod traits;
pub mod value;

pub use row::Row;
pub use schema::{Column, TableDescriptor};
pub use traits::{DestinationSession, SchemaCatalog};
pub use value::{SqlKind, SqlValue};
