use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    dispatch, subject, Ack, ConfigError, Delivery, DeliveryError, Notifier, NotifierFactory,
    TransportError,
};
use crate::{
    template::{AlertBatch, DeliveryContext},
    Options,
};

pub const WEBHOOK_KIND: &str = "Webhook";

/// The shape the opaque receiver value must deserialize into.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebhookReceiver {
    pub urls: Vec<String>,
    pub headers: HashMap<String, String>,
}

/// Per-recipient webhook settings; cloned fresh per URL per batch.
#[derive(Debug, Clone)]
pub struct WebhookTarget {
    pub url: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug)]
pub struct WebhookNotifier {
    urls: Vec<String>,
    headers: HashMap<String, String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(value: &Value, opts: &Options, client: reqwest::Client) -> Result<Self, ConfigError> {
        let receiver: WebhookReceiver =
            serde_json::from_value(value.clone()).map_err(|source| ConfigError::ReceiverShape {
                kind: WEBHOOK_KIND,
                source,
            })?;

        if receiver.urls.is_empty() {
            return Err(ConfigError::MissingConfig("webhook"));
        }

        Ok(WebhookNotifier {
            urls: receiver.urls,
            headers: receiver.headers,
            timeout: opts.timeout_for(WEBHOOK_KIND),
            client,
        })
    }

    pub fn factory(client: reqwest::Client) -> NotifierFactory {
        std::sync::Arc::new(move |value, opts| {
            match WebhookNotifier::new(value, opts, client.clone()) {
                Ok(notifier) => Ok(std::sync::Arc::new(notifier) as std::sync::Arc<dyn Notifier>),
                Err(e) => {
                    log::error!("Notifier [{}]: {}", WEBHOOK_KIND, e);
                    Err(e)
                }
            }
        })
    }
}

/// JSON document posted to each URL; one per batch.
pub fn payload(batch: &AlertBatch, subject: &str, context: &DeliveryContext) -> Value {
    json!({
        "receiver": context.receiver,
        "status": batch.status(),
        "subject": subject,
        "groupLabels": context.group_labels,
        "commonLabels": batch.common_labels,
        "externalURL": context.external_url.as_ref().map(|u| u.to_string()),
        "firing": batch.firing,
        "resolved": batch.resolved,
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn kind(&self) -> &str {
        WEBHOOK_KIND
    }

    async fn notify(&self, batches: &[AlertBatch]) -> Vec<DeliveryError> {
        let mut errs = Vec::new();

        for batch in batches {
            let subject = subject::synthesize(batch);
            let context = DeliveryContext::for_batch(batch);
            let body = payload(batch, &subject, &context);

            let deliveries: Vec<Delivery<WebhookTarget>> = self
                .urls
                .iter()
                .map(|url| Delivery {
                    recipient: url.clone(),
                    subject: subject.clone(),
                    config: WebhookTarget {
                        url: url.clone(),
                        headers: self.headers.clone(),
                    },
                    timeout: self.timeout,
                })
                .collect();

            let body = &body;
            let client = &self.client;
            errs.extend(
                dispatch::run(deliveries, move |target, _recipient| async move {
                    post(client, &target, body).await
                })
                .await,
            );
        }

        errs
    }
}

async fn post(
    client: &reqwest::Client,
    target: &WebhookTarget,
    body: &Value,
) -> Result<Ack, TransportError> {
    let mut req = client.post(&target.url).json(body);
    for (k, v) in &target.headers {
        req = req.header(k, v);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| TransportError::Send(e.into()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(TransportError::Send(anyhow::anyhow!(
            "webhook returned status {}: {}",
            status,
            text
        )));
    }

    Ok(Ack::default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::template::KV;

    fn batch() -> AlertBatch {
        let mut labels = KV::new();
        labels.insert("namespace".to_string(), "ns1".to_string());
        AlertBatch {
            receiver: "ops".to_string(),
            common_labels: labels,
            external_url: "http://am.example:9093".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_wrong_shape() {
        let value = json!({"urls": 42});
        let err =
            WebhookNotifier::new(&value, &Options::default(), reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ReceiverShape { kind, .. } if kind == WEBHOOK_KIND));
    }

    #[test]
    fn test_new_rejects_empty_urls() {
        let err = WebhookNotifier::new(&json!({}), &Options::default(), reqwest::Client::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig("webhook")));
    }

    #[test]
    fn test_payload_shape() {
        let b = batch();
        let ctx = DeliveryContext::for_batch(&b);
        let p = payload(&b, " ns1", &ctx);
        assert_eq!(p["receiver"], "ops");
        assert_eq!(p["status"], "resolved");
        assert_eq!(p["subject"], " ns1");
        assert_eq!(p["commonLabels"]["namespace"], "ns1");
        assert_eq!(p["externalURL"], "http://am.example:9093/");
    }
}
