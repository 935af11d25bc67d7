//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation ID for tracking one transfer request across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Span wrapping a whole transfer request
pub fn request_span(correlation_id: &CorrelationId, recipients: usize, batches: usize) -> Span {
    tracing::info_span!(
        "transfer",
        correlation_id = %correlation_id,
        recipients,
        batches
    )
}

/// Span wrapping every attempt of one batch
pub fn batch_span(batch_index: usize, recipients: usize) -> Span {
    tracing::info_span!("batch", index = batch_index, recipients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_correlation_id_from_str() {
        let id = CorrelationId::from("req-1");
        assert_eq!(id.to_string(), "req-1");
    }
}
