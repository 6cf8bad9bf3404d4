pub mod cmd;
pub mod conf;
pub mod global;
pub mod notify;
pub mod template;

pub use global::{Options, DEFAULT_SEND_TIMEOUT};
pub use notify::{
    register_builtins, Ack, ConfigError, Delivery, DeliveryError, EmailConfig, EmailNotifier,
    EmailReceiver, EmailSender, LogSender, MessageBody, Notifier, NotifierFactory, Registry,
    TlsSettings, TransportError, WebhookNotifier, WebhookReceiver, EMAIL_KIND, WEBHOOK_KIND,
};
pub use template::{Alert, AlertBatch, DeliveryContext, KV};
