//! Default values for configuration

/// Default URL of the complete broadcast list
pub fn default_full_url() -> String {
    std::env::var("KUCKMAL_FULL_URL")
        .unwrap_or_else(|_| "https://verteiler1.mediathekview.de/Filmliste-akt.xz".to_string())
}

/// Default URL of the differential broadcast list
pub fn default_diff_url() -> String {
    std::env::var("KUCKMAL_DIFF_URL")
        .unwrap_or_else(|_| "https://verteiler1.mediathekview.de/Filmliste-diff.xz".to_string())
}

/// Default request timeout in seconds
pub fn default_timeout_secs() -> u64 {
    30
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("kuckmal/{}", env!("CARGO_PKG_VERSION"))
}

/// Default interval between remote update checks
pub fn default_check_interval_hours() -> u64 {
    24
}

/// Default number of records per batch
pub fn default_batch_size() -> usize {
    5000
}

/// Default number of batches buffered between parser and merge loop
pub fn default_channel_capacity() -> usize {
    4
}

/// Default page size for queries
pub fn default_query_limit() -> usize {
    100
}

/// Upper bound for any single query page
pub fn default_query_max_limit() -> usize {
    10_000
}

/// Largest batch size accepted by validation
pub const MAX_BATCH_SIZE: usize = 100_000;
