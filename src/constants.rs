//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Token estimation constants
pub mod tokens {
    /// Characters per token for the default character-ratio estimator
    pub const CHARS_PER_TOKEN: f32 = 4.0;

    /// Tokens per whitespace-separated word for the word-ratio estimator
    pub const TOKENS_PER_WORD: f32 = 1.3;

    /// Default number of concurrent estimation workers
    pub const ESTIMATION_WORKERS: usize = 8;
}

/// Context window validation constants
pub mod validation {
    /// Utilization (percent of budget) at which a valid request gets a warning
    pub const WARNING_UTILIZATION_PCT: f64 = 85.0;

    /// Default share of the context window usable for input
    pub const DEFAULT_MAX_UTILIZATION_PCT: f64 = 80.0;

    /// Required-token multipliers per document complexity
    pub mod complexity {
        pub const SIMPLE: f64 = 1.0;
        pub const MODERATE: f64 = 1.1;
        pub const COMPLEX: f64 = 1.25;
    }
}

/// Priority ranking constants
pub mod ranking {
    pub const RELEVANCE_WEIGHT: f64 = 0.35;
    pub const QUALITY_WEIGHT: f64 = 0.25;
    pub const PRIORITY_WEIGHT: f64 = 0.25;
    pub const RECENCY_WEIGHT: f64 = 0.15;

    /// Days over which recency decays linearly to zero
    pub const RECENCY_HORIZON_DAYS: u32 = 365;

    /// Score contributed by each priority tier
    pub mod priority {
        pub const CRITICAL: f64 = 100.0;
        pub const HIGH: f64 = 75.0;
        pub const MEDIUM: f64 = 50.0;
        pub const LOW: f64 = 25.0;
    }
}

/// Clustering constants
pub mod clustering {
    /// Corpus size above which documents are clustered before selection
    pub const LARGE_SCALE_THRESHOLD: usize = 100;

    /// Default maximum number of clusters per request
    pub const DEFAULT_MAX_CLUSTERS: usize = 12;

    /// Upper bounds (in days) of the temporal recency bands
    pub const TEMPORAL_BANDS_DAYS: [i64; 4] = [7, 30, 90, 365];
}

/// Compression constants
pub mod compression {
    /// Minimum acceptable structural quality score (0-100)
    pub const DEFAULT_QUALITY_THRESHOLD: f64 = 60.0;

    /// Target ratios tried by the summarized fallback, in order
    pub const SUMMARY_TARGET_RATIOS: [f64; 3] = [0.5, 0.3, 0.15];

    /// Number of most frequent terms checked for key-term retention
    pub const KEY_TERM_COUNT: usize = 20;

    /// Minimum term length considered a key term
    pub const MIN_TERM_LEN: usize = 4;

    /// Default number of clusters compressed concurrently
    pub const COMPRESSION_WORKERS: usize = 4;

    /// Quality dimension weights (sum to 1.0)
    pub mod weights {
        pub const HEADINGS: f64 = 0.35;
        pub const KEY_TERMS: f64 = 0.45;
        pub const CROSS_REFERENCES: f64 = 0.20;
    }
}

/// Fallback orchestration constants
pub mod fallback {
    /// Chunks per budget when splitting documents in the chunked state
    pub const CHUNKS_PER_BUDGET: u64 = 4;
}

/// Document store constants
pub mod storage {
    /// Documents fetched per page from the document store
    pub const DEFAULT_PAGE_SIZE: usize = 200;

    /// Default SQLite database location (relative to the project directory)
    pub const DEFAULT_DATABASE_PATH: &str = ".contextweave/documents.db";
}
