use thiserror::Error;

/// Errors that can occur when interacting with the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The topic has not been created.
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    /// The subscription has not been created.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The subscription exists but is attached to a different topic.
    #[error("Subscription {subscription} is already attached to topic {existing}")]
    SubscriptionConflict {
        subscription: String,
        existing: String,
    },

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
