use std::time::Duration;

/// Top-level error of the exploration engine.
#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Provider throttling. Honored unconditionally: the caller sleeps
    /// `retry_after` and re-sends the same stimulus, with no retry cap.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("transient transport failure: {reason}")]
    Transient { reason: String },

    /// The message reference of an interactive control is no longer valid.
    #[error("invalid message reference: {reason}")]
    InvalidReference { reason: String },

    #[error("subscription rejected: {reason}")]
    SubscriptionRejected { reason: String },
}

#[derive(Debug, thiserror::Error)]
#[error("reply proposal failed: {0}")]
pub struct OracleError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("media fetch failed: {0}")]
pub struct MediaError(pub String);

/// Violations of the state-model assumptions. Propagated, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(
        "reconcile mismatch at position {position}: recorded `{recorded}` vs replayed `{replayed}`"
    )]
    ReconcileMismatch {
        position: usize,
        recorded: String,
        replayed: String,
    },

    #[error("reconcile arity mismatch: {recorded} recorded vs {replayed} replayed non-AI actions")]
    ReconcileArity { recorded: usize, replayed: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
