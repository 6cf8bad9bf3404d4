use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    dispatch, subject, Ack, ConfigError, Delivery, DeliveryError, Notifier, NotifierFactory,
    TransportError,
};
use crate::{
    template::{self, Alert, AlertBatch, DeliveryContext, RenderFn},
    Options,
};

pub const EMAIL_KIND: &str = "Email";
pub const SUBJECT_HEADER: &str = "Subject";

/// TLS settings are read-only after construction and shared by reference
/// across config clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TlsSettings {
    pub server_name: String,
    pub insecure_skip_verify: bool,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
}

/// Base delivery settings shared by every recipient of one notifier
/// instance. The notifier never mutates it in place; each send derives its
/// own copy via [`EmailConfig::isolated`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EmailConfig {
    pub to: String,
    pub from: String,
    pub hello: String,
    pub smarthost: String,
    pub auth_username: String,
    pub auth_password: String,
    pub auth_secret: String,
    pub auth_identity: String,
    pub headers: HashMap<String, String>,
    /// Template name for the HTML body; defaulted at construction.
    pub html: String,
    /// Template name for the plain-text body, optional.
    pub text: String,
    pub require_tls: bool,
    pub tls: Arc<TlsSettings>,
}

impl EmailConfig {
    /// Derives an independent copy for one recipient: destination cleared,
    /// header map freshly allocated (contents copied), TLS settings shared
    /// by reference. Mutating the copy's destination or headers cannot
    /// touch the base or any sibling copy.
    pub fn isolated(&self) -> EmailConfig {
        EmailConfig {
            to: String::new(),
            from: self.from.clone(),
            hello: self.hello.clone(),
            smarthost: self.smarthost.clone(),
            auth_username: self.auth_username.clone(),
            auth_password: self.auth_password.clone(),
            auth_secret: self.auth_secret.clone(),
            auth_identity: self.auth_identity.clone(),
            headers: self.headers.clone(),
            html: self.html.clone(),
            text: self.text.clone(),
            require_tls: self.require_tls,
            tls: Arc::clone(&self.tls),
        }
    }
}

/// Clone of the base config, or `None` when there is no base to clone.
pub fn clone_config(base: Option<&EmailConfig>) -> Option<EmailConfig> {
    base.map(EmailConfig::isolated)
}

/// The shape the opaque receiver value must deserialize into.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EmailReceiver {
    pub to: Vec<String>,
    pub email_config: Option<EmailConfig>,
}

/// Rendered message content, produced once per batch.
#[derive(Debug, Clone, Default)]
pub struct MessageBody {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// The wire transport. Receives a recipient-specific config (destination
/// and subject header already set), the rendered bodies, the batch context
/// and the mapped alerts. The dispatch loop enforces the deadline around
/// this call.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn deliver(
        &self,
        config: &EmailConfig,
        body: &MessageBody,
        context: &DeliveryContext,
        alerts: &[Alert],
    ) -> Result<Ack, TransportError>;
}

pub struct EmailNotifier {
    to: Vec<String>,
    config: EmailConfig,
    render_html: RenderFn,
    render_text: Option<RenderFn>,
    timeout: Duration,
    sender: Arc<dyn EmailSender>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("to", &self.to)
            .field("config", &self.config)
            .field("render_html", &self.render_html)
            .field("render_text", &self.render_text)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EmailNotifier {
    pub fn new(
        value: &Value,
        opts: &Options,
        sender: Arc<dyn EmailSender>,
    ) -> Result<Self, ConfigError> {
        let receiver: EmailReceiver =
            serde_json::from_value(value.clone()).map_err(|source| ConfigError::ReceiverShape {
                kind: EMAIL_KIND,
                source,
            })?;

        let mut config = clone_config(receiver.email_config.as_ref())
            .ok_or(ConfigError::MissingConfig("email"))?;

        if config.html.is_empty() {
            config.html = template::EMAIL_DEFAULT_HTML.to_string();
        }
        let render_html = template::lookup_template(&config.html)
            .ok_or_else(|| ConfigError::Template(config.html.clone()))?;
        let render_text = if config.text.is_empty() {
            None
        } else {
            Some(
                template::lookup_template(&config.text)
                    .ok_or_else(|| ConfigError::Template(config.text.clone()))?,
            )
        };

        Ok(EmailNotifier {
            to: receiver.to,
            config,
            render_html,
            render_text,
            timeout: opts.timeout_for(EMAIL_KIND),
            sender,
        })
    }

    pub fn factory(sender: Arc<dyn EmailSender>) -> NotifierFactory {
        Arc::new(move |value, opts| {
            match EmailNotifier::new(value, opts, Arc::clone(&sender)) {
                Ok(notifier) => Ok(Arc::new(notifier) as Arc<dyn Notifier>),
                Err(e) => {
                    log::error!("Notifier [{}]: {}", EMAIL_KIND, e);
                    Err(e)
                }
            }
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn kind(&self) -> &str {
        EMAIL_KIND
    }

    async fn notify(&self, batches: &[AlertBatch]) -> Vec<DeliveryError> {
        let mut errs = Vec::new();

        for batch in batches {
            let subject = subject::synthesize(batch);
            let context = DeliveryContext::for_batch(batch);
            let alerts = batch.alerts();
            let body = MessageBody {
                subject: subject.clone(),
                html: (self.render_html)(batch, &context),
                text: self
                    .render_text
                    .map(|render| render(batch, &context))
                    .unwrap_or_default(),
            };

            let deliveries: Vec<Delivery<EmailConfig>> = self
                .to
                .iter()
                .map(|to| {
                    let mut config = self.config.isolated();
                    config.to = to.clone();
                    config
                        .headers
                        .insert(SUBJECT_HEADER.to_string(), subject.clone());
                    Delivery {
                        recipient: to.clone(),
                        subject: subject.clone(),
                        config,
                        timeout: self.timeout,
                    }
                })
                .collect();

            let body = &body;
            let context = &context;
            let alerts = alerts.as_slice();
            errs.extend(
                dispatch::run(deliveries, move |config, _recipient| async move {
                    self.sender.deliver(&config, body, context, alerts).await
                })
                .await,
            );
        }

        errs
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::template::KV;

    fn base_config() -> EmailConfig {
        let mut headers = HashMap::new();
        headers.insert("X-Priority".to_string(), "1".to_string());
        EmailConfig {
            from: "noreply@example.com".to_string(),
            smarthost: "smtp.example.com:25".to_string(),
            headers,
            tls: Arc::new(TlsSettings {
                server_name: "smtp.example.com".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn receiver_value() -> Value {
        json!({
            "to": ["a@example.com", "b@example.com"],
            "email_config": {
                "from": "noreply@example.com",
                "smarthost": "smtp.example.com:25"
            }
        })
    }

    fn batch() -> AlertBatch {
        let mut labels = KV::new();
        labels.insert("namespace".to_string(), "ns1".to_string());
        labels.insert("alertname".to_string(), "HighCPU".to_string());
        AlertBatch {
            receiver: "ops".to_string(),
            common_labels: labels.clone(),
            external_url: "http://am.example:9093".to_string(),
            firing: vec![Alert {
                labels,
                annotations: KV::new(),
                starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                ends_at: None,
                generator_url: String::new(),
            }],
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct FakeSender {
        delivered: Mutex<Vec<(String, String)>>,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl EmailSender for FakeSender {
        async fn deliver(
            &self,
            config: &EmailConfig,
            _body: &MessageBody,
            _context: &DeliveryContext,
            _alerts: &[Alert],
        ) -> Result<Ack, TransportError> {
            let subject = config
                .headers
                .get(SUBJECT_HEADER)
                .cloned()
                .unwrap_or_default();
            self.delivered
                .lock()
                .unwrap()
                .push((config.to.clone(), subject));
            if self.fail_for.contains(&config.to) {
                return Err(TransportError::Send(anyhow!("smtp refused")));
            }
            Ok(Ack::default())
        }
    }

    #[test]
    fn test_isolated_clones_are_independent() {
        let base = base_config();
        let mut one = base.isolated();
        let two = base.isolated();

        one.to = "a@example.com".to_string();
        one.headers
            .insert(SUBJECT_HEADER.to_string(), "changed".to_string());

        assert_eq!(base.to, "");
        assert_eq!(two.to, "");
        assert!(!base.headers.contains_key(SUBJECT_HEADER));
        assert!(!two.headers.contains_key(SUBJECT_HEADER));
        // copied content survives, the TLS block is shared
        assert_eq!(one.headers["X-Priority"], "1");
        assert!(Arc::ptr_eq(&base.tls, &one.tls));
    }

    #[test]
    fn test_clone_config_absent_base() {
        assert!(clone_config(None).is_none());
        assert!(clone_config(Some(&base_config())).is_some());
    }

    #[test]
    fn test_new_rejects_wrong_shape() {
        let sender = Arc::new(FakeSender::default());
        let value = json!({"to": "not-an-array"});
        let err = EmailNotifier::new(&value, &Options::default(), sender).unwrap_err();
        assert!(matches!(err, ConfigError::ReceiverShape { kind, .. } if kind == EMAIL_KIND));
    }

    #[test]
    fn test_new_rejects_missing_config() {
        let sender = Arc::new(FakeSender::default());
        let value = json!({"to": ["a@example.com"]});
        let err = EmailNotifier::new(&value, &Options::default(), sender).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig("email")));
    }

    #[test]
    fn test_new_rejects_unknown_template() {
        let sender = Arc::new(FakeSender::default());
        let value = json!({
            "to": ["a@example.com"],
            "email_config": {"html": "email.missing"}
        });
        let err = EmailNotifier::new(&value, &Options::default(), sender).unwrap_err();
        assert!(matches!(err, ConfigError::Template(name) if name == "email.missing"));
    }

    #[test]
    fn test_timeout_override() {
        let sender = Arc::new(FakeSender::default());
        let n = EmailNotifier::new(&receiver_value(), &Options::default(), sender.clone()).unwrap();
        assert_eq!(n.timeout(), crate::DEFAULT_SEND_TIMEOUT);

        let mut opts = Options::default();
        opts.notification_timeout.insert(EMAIL_KIND.to_string(), 9);
        let n = EmailNotifier::new(&receiver_value(), &opts, sender).unwrap();
        assert_eq!(n.timeout(), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_notify_delivers_to_every_recipient() {
        let sender = Arc::new(FakeSender::default());
        let n =
            EmailNotifier::new(&receiver_value(), &Options::default(), sender.clone()).unwrap();

        let errs = n.notify(&[batch()]).await;
        assert!(errs.is_empty());

        let delivered = sender.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, "a@example.com");
        assert_eq!(delivered[1].0, "b@example.com");
        assert_eq!(delivered[0].1, "[FIRING:1]  ns1/HighCPU");
    }

    #[tokio::test]
    async fn test_notify_collects_partial_failures() {
        let sender = Arc::new(FakeSender {
            fail_for: vec!["a@example.com".to_string()],
            ..Default::default()
        });
        let n =
            EmailNotifier::new(&receiver_value(), &Options::default(), sender.clone()).unwrap();

        let errs = n.notify(&[batch(), batch()]).await;
        // one failing recipient, two batches, all four attempts made
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].recipient, "a@example.com");
        assert_eq!(sender.delivered.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_notify_bad_external_url_is_fail_soft() {
        let sender = Arc::new(FakeSender::default());
        let n =
            EmailNotifier::new(&receiver_value(), &Options::default(), sender.clone()).unwrap();

        let mut b = batch();
        b.external_url = "::not-a-url::".to_string();
        let errs = n.notify(&[b]).await;
        assert!(errs.is_empty());
        assert_eq!(sender.delivered.lock().unwrap().len(), 2);
    }
}
