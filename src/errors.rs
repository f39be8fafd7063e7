use thiserror::Error;

/// Errors of the buffer allocator.
#[derive(Error, Debug)]
pub enum AllocError {
    #[error("buffer allocation failed")]
    AllocFailed,

    #[error("DMA map failed")]
    MapFailed,

    #[error("allocation retries exhausted after {0} attempts")]
    Exhausted(u32),
}

/// Errors of the restitch/delivery path.
///
/// Every constructor of these errors has already settled buffer ownership:
/// the offending buffer (or fragment chain) was freed before the error is
/// returned, unless the function signature hands the buffer back explicitly.
#[derive(Error, Debug)]
pub enum DeliverError {
    #[error("no monitor consumer registered")]
    NoConsumer,

    #[error("MPDU restitch failed: {0}")]
    Restitch(&'static str),

    #[error("monitor header attach failed")]
    HeaderAttach,

    #[error("insufficient headroom")]
    NoHeadroom,

    #[error("frame not eligible for forwarding")]
    Filtered,
}

/// Errors when loading capture configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse capture config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
