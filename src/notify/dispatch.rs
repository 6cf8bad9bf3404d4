use std::{future::Future, time::Duration};

use super::{DeliveryError, TransportError};

/// Transport acknowledgement for one accepted delivery.
#[derive(Debug, Default)]
pub struct Ack {
    pub message_id: Option<String>,
}

/// One recipient's unit of work: its own config clone, the batch subject,
/// and the deadline bounding the attempt. Owning everything it needs keeps
/// recipients from aliasing shared state across iterations.
#[derive(Debug)]
pub struct Delivery<C> {
    pub recipient: String,
    pub subject: String,
    pub config: C,
    pub timeout: Duration,
}

/// Fans the deliveries out one by one, each attempt bounded by its own
/// deadline. Every failure is collected; none aborts the loop. Exactly one
/// attempt is made per task, so N tasks always means N attempts. A timed
/// out attempt is dropped in place and cannot cancel any other.
pub async fn run<C, F, Fut>(deliveries: Vec<Delivery<C>>, send: F) -> Vec<DeliveryError>
where
    F: Fn(C, String) -> Fut,
    Fut: Future<Output = Result<Ack, TransportError>>,
{
    let mut errs = Vec::new();

    for delivery in deliveries {
        let Delivery {
            recipient,
            subject,
            config,
            timeout,
        } = delivery;

        let attempt = send(config, recipient.clone());
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(_ack)) => {
                log::debug!("Delivered [{}] to [{}]", subject, recipient);
            }
            Ok(Err(source)) => {
                log::error!(
                    "Delivery to [{}] failed (subject: {}): {}",
                    recipient,
                    subject,
                    source
                );
                errs.push(DeliveryError {
                    recipient,
                    subject,
                    source,
                });
            }
            Err(_) => {
                log::error!(
                    "Delivery to [{}] timed out after {:?} (subject: {})",
                    recipient,
                    timeout,
                    subject
                );
                errs.push(DeliveryError {
                    recipient,
                    subject,
                    source: TransportError::Timeout(timeout),
                });
            }
        }
    }

    errs
}
