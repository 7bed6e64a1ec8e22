//! Dataset intake, loading and completeness profiling

pub mod completeness;
pub mod dataset;
pub mod intake;
pub mod loader;

pub use completeness::{ColumnCompleteness, CompletenessReport, profile};
pub use dataset::{Column, ColumnKind, Dataset, is_missing_token, parse_number};
pub use intake::{StoredFile, cleanup_file, fingerprint, store_upload};
pub use loader::{LoadOptions, load_dataset};
