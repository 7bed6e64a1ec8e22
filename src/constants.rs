//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Assessment/plan service constants
pub mod llm {
    /// Provider used when none is configured
    pub const DEFAULT_PROVIDER: &str = "gemini";

    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Sampling temperature for the column assessment call
    pub const ASSESSMENT_TEMPERATURE: f32 = 0.2;

    /// Sampling temperature for the detailed plan call
    pub const PLAN_TEMPERATURE: f32 = 0.1;

    /// Default generation limit
    pub const DEFAULT_MAX_TOKENS: usize = 4096;

    /// Raw responses longer than this are truncated in logs
    pub const LOG_PREVIEW_CHARS: usize = 500;
}

/// Workflow constants
pub mod workflow {
    /// Directory for uploaded datasets
    pub const UPLOAD_DIR: &str = ".statpilot/uploads";

    /// Session database location
    pub const DATABASE_PATH: &str = ".statpilot/sessions.db";

    /// Maximum accepted dataset size (16 MiB)
    pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

    /// Default significance threshold
    pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

    /// Accepted dataset extensions
    pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
}

/// Statistical routine constants
pub mod stats {
    /// p-values below this are reported as "< 0.001"
    pub const P_VALUE_FLOOR: f64 = 0.001;

    /// Expected cell counts below this make chi-square unreliable
    pub const MIN_EXPECTED_FREQUENCY: f64 = 5.0;

    /// Cell values treated as missing (compared case-insensitively)
    pub const MISSING_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "-"];
}

/// Chart rendering constants
pub mod chart {
    /// Default chart width (pixels)
    pub const WIDTH: u32 = 720;

    /// Default chart height (pixels)
    pub const HEIGHT: u32 = 432;

    /// Histogram bin count ceiling
    pub const MAX_HISTOGRAM_BINS: usize = 30;

    /// Count-bar charts show at most this many categories
    pub const MAX_CATEGORIES: usize = 25;

    /// Data URI prefix for embedded charts
    pub const DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";
}
