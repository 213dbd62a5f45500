//! Error types for document chunking

/// Error types for chunking operations
#[derive(thiserror::Error, Debug)]
pub enum ChunkingError {
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Token counter error: {0}")]
    TokenCounter(String),

    #[error("Id generation failed: {0}")]
    IdGeneration(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal processing error: {0}")]
    Internal(String),
}

/// Result type for chunking operations
pub type Result<T> = std::result::Result<T, ChunkingError>;

impl ChunkingError {
    /// Create a strategy lookup error
    pub fn strategy_not_found<S: Into<String>>(id: S) -> Self {
        Self::StrategyNotFound(id.into())
    }

    /// Create an options validation error
    pub fn invalid_options<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOptions(msg.into())
    }

    /// Create a markup parsing error
    pub fn malformed_input<S: Into<String>>(msg: S) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create a token counter error
    pub fn token_counter<S: Into<String>>(msg: S) -> Self {
        Self::TokenCounter(msg.into())
    }

    /// Create an internal processing error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if retrying the same call could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            // caller or configuration errors
            Self::StrategyNotFound(_) | Self::InvalidOptions(_) | Self::MalformedInput(_) => false,
            Self::Serialization(_) => false,
            Self::TokenCounter(_) | Self::IdGeneration(_) => true,
            Self::Internal(_) => false,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Self::StrategyNotFound(_) => "strategy_not_found",
            Self::InvalidOptions(_) => "invalid_options",
            Self::MalformedInput(_) => "malformed_input",
            Self::TokenCounter(_) => "token_counter",
            Self::IdGeneration(_) => "id_generation",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}
