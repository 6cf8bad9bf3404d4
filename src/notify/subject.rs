use crate::template::AlertBatch;

/// Turns a batch's metadata into a deterministic, human-readable subject
/// line: firing/resolved counts, then `namespace/alertname`, then the
/// remaining common labels parenthesized. Labels live in an unordered map,
/// so the remaining keys are sorted before joining; the same batch always
/// yields a byte-identical subject.
pub fn synthesize(batch: &AlertBatch) -> String {
    let mut subject = String::new();

    let firing = batch.firing.len();
    if firing > 0 {
        subject = format!("[FIRING:{}] ", firing);
    }

    let resolved = batch.resolved.len();
    if resolved > 0 {
        subject = format!("{}[RESOLVED:{}] ", subject, resolved);
    }

    let ns = batch
        .common_labels
        .get("namespace")
        .map(String::as_str)
        .unwrap_or("");
    let alertname = batch
        .common_labels
        .get("alertname")
        .map(String::as_str)
        .unwrap_or("");

    if !ns.is_empty() {
        subject = format!("{} {}", subject, ns);
    }

    if !alertname.is_empty() {
        if !ns.is_empty() {
            subject = format!("{}/{}", subject, alertname);
        } else {
            subject = format!("{}{}", subject, alertname);
        }
    }

    let mut rest: Vec<_> = batch
        .common_labels
        .iter()
        .filter(|(k, _)| k.as_str() != "namespace" && k.as_str() != "alertname")
        .collect();
    rest.sort_by(|a, b| a.0.cmp(b.0));

    if !rest.is_empty() {
        let labels = rest
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        subject = format!("{} ({})", subject, labels);
    }

    subject
}
