use std::time::Duration;

use thiserror::Error;

/// Fatal to notifier construction; the notifier is not created and the
/// caller decides whether to skip or abort the receiver.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("notifier kind [{0}] is already registered")]
    DuplicateKind(String),
    #[error("unknown notifier kind [{0}]")]
    UnknownKind(String),
    #[error("receiver value has the wrong shape for kind [{kind}]: {source}")]
    ReceiverShape {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("empty {0} config")]
    MissingConfig(&'static str),
    #[error("unknown template [{0}]")]
    Template(String),
}

/// One recipient's transport failure. Never fatal to the batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Send(#[from] anyhow::Error),
}

/// A transport failure tagged with the recipient and subject it belonged
/// to, collected across the whole dispatch before being returned.
#[derive(Debug, Error)]
#[error("delivery to [{recipient}] failed (subject: {subject}): {source}")]
pub struct DeliveryError {
    pub recipient: String,
    pub subject: String,
    #[source]
    pub source: TransportError,
}

impl DeliveryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, TransportError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError {
            recipient: "ops@example.com".to_string(),
            subject: "[FIRING:1] test".to_string(),
            source: TransportError::Timeout(Duration::from_secs(3)),
        };
        let msg = err.to_string();
        assert!(msg.contains("ops@example.com"));
        assert!(msg.contains("[FIRING:1] test"));
        assert!(err.is_timeout());
    }
}
