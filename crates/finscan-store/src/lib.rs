//! Day-scoped SQLite store for videos, analysis methods, and analysis runs.
//!
//! One self-contained database file per calendar day of a deployment.
//! Opening an existing file reuses it; the schema is only created when
//! missing. Analysis rows are append-only: re-processing a segment adds a
//! new run rather than replacing the prior one.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{AnalysisRecord, DayStore, MethodRecord, VideoRecord};
