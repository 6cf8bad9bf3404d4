use std::{
    collections::HashMap,
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Label and annotation sets. Unordered by nature; anything that needs a
/// stable rendering order (e.g. the subject line) sorts the keys itself.
pub type KV = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub labels: KV,
    #[serde(default)]
    pub annotations: KV,
    pub starts_at: DateTime<Utc>,
    /// Absent while the alert is still firing.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
}

/// One group of alerts sharing a receiver and common labels, delivered as
/// one logical message. The firing and resolved partitions keep their
/// original order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertBatch {
    pub receiver: String,
    pub group_labels: KV,
    pub common_labels: KV,
    pub common_annotations: KV,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub firing: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

impl AlertBatch {
    /// All alerts of the batch, firing first, original order preserved.
    pub fn alerts(&self) -> Vec<Alert> {
        self.firing
            .iter()
            .chain(self.resolved.iter())
            .cloned()
            .collect()
    }

    pub fn status(&self) -> &'static str {
        if self.firing.is_empty() {
            "resolved"
        } else {
            "firing"
        }
    }
}

/// Per-batch context handed to the transport alongside the alerts.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub receiver: String,
    pub group_labels: KV,
    pub external_url: Option<Url>,
}

impl DeliveryContext {
    pub fn for_batch(batch: &AlertBatch) -> Self {
        DeliveryContext {
            receiver: batch.receiver.clone(),
            group_labels: batch.group_labels.clone(),
            external_url: parse_external_url(&batch.external_url),
        }
    }
}

/// An unparseable external URL degrades to `None` instead of failing the
/// batch; the template context simply loses its backlink.
pub fn parse_external_url(raw: &str) -> Option<Url> {
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("Invalid external URL [{}]: {}", raw, e);
            None
        }
    }
}

pub type RenderFn = fn(&AlertBatch, &DeliveryContext) -> String;

pub const EMAIL_DEFAULT_HTML: &str = "email.default.html";
pub const EMAIL_DEFAULT_TEXT: &str = "email.default.text";

static TEMPLATES: LazyLock<HashMap<&'static str, RenderFn>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, RenderFn> = HashMap::new();
    m.insert(EMAIL_DEFAULT_HTML, to_html);
    m.insert(EMAIL_DEFAULT_TEXT, to_text);
    m
});

/// Resolves a template name to its render function. Resolution happens at
/// notifier construction, so an unknown name never surfaces mid-send.
pub fn lookup_template(name: &str) -> Option<RenderFn> {
    TEMPLATES.get(name).copied()
}

fn sorted(kv: &KV) -> Vec<(&String, &String)> {
    let mut pairs: Vec<_> = kv.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
}

fn to_text(batch: &AlertBatch, ctx: &DeliveryContext) -> String {
    let mut out = String::new();
    for (section, alerts) in [("Firing", &batch.firing), ("Resolved", &batch.resolved)] {
        if alerts.is_empty() {
            continue;
        }
        out.push_str(&format!("{} ({})\n", section, alerts.len()));
        for alert in alerts {
            for (k, v) in sorted(&alert.labels) {
                out.push_str(&format!("  {} = {}\n", k, v));
            }
            for (k, v) in sorted(&alert.annotations) {
                out.push_str(&format!("  {}: {}\n", k, v));
            }
            out.push_str(&format!("  started: {}\n", alert.starts_at.to_rfc3339()));
            if let Some(ends) = alert.ends_at {
                out.push_str(&format!("  ended: {}\n", ends.to_rfc3339()));
            }
        }
    }
    if let Some(url) = &ctx.external_url {
        out.push_str(&format!("\n{}\n", url));
    }
    out
}

fn to_html(batch: &AlertBatch, ctx: &DeliveryContext) -> String {
    let mut out = String::from("<html><body>");
    for (section, alerts) in [("Firing", &batch.firing), ("Resolved", &batch.resolved)] {
        if alerts.is_empty() {
            continue;
        }
        out.push_str(&format!("<h3>{} ({})</h3><ul>", section, alerts.len()));
        for alert in alerts {
            out.push_str("<li>");
            for (k, v) in sorted(&alert.labels) {
                out.push_str(&format!("<b>{}</b>={} ", k, v));
            }
            for (k, v) in sorted(&alert.annotations) {
                out.push_str(&format!("<br/>{}: {}", k, v));
            }
            out.push_str("</li>");
        }
        out.push_str("</ul>");
    }
    if let Some(url) = &ctx.external_url {
        out.push_str(&format!("<p><a href=\"{}\">{}</a></p>", url, url));
    }
    out.push_str("</body></html>");
    out
}
