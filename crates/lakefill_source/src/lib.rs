//! Legacy store access for lakefill.
//!
//! Opens the source SQLite database read-only and reads whole tables into
//! Arrow record batches. Every run is a full extract: no filtering, no
//! pagination, no incremental reads.
//!
//! ```rust,ignore
//! use lakefill_source::SourceDb;
//!
//! let db = SourceDb::open("legacy-db/Chinook_Sqlite.sqlite")?;
//! for name in db.table_names()? {
//!     let table = db.read_table(&name)?;
//!     println!("{}: {} rows", table.name(), table.num_rows());
//! }
//! ```

mod convert;
mod error;
mod sqlite;
mod table;

pub use error::{IdentifierKind, Result, SchemaMismatch, SourceError};
pub use sqlite::SourceDb;
pub use table::SourceTable;
