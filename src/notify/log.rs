use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{Ack, EmailConfig, EmailSender, MessageBody, TransportError};
use crate::template::{Alert, DeliveryContext};

/// Transport that appends rendered messages to a file, or to the process
/// log when no file is configured. Stands in for a real SMTP relay in the
/// CLI's dry mode.
#[derive(Default)]
pub struct LogSender {
    file: Option<Arc<Mutex<File>>>,
}

impl LogSender {
    pub fn to_file(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open output file {}: {}", path.display(), e))?;
        Ok(LogSender {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }
}

#[async_trait]
impl EmailSender for LogSender {
    async fn deliver(
        &self,
        config: &EmailConfig,
        body: &MessageBody,
        _context: &DeliveryContext,
        alerts: &[Alert],
    ) -> Result<Ack, TransportError> {
        match &self.file {
            Some(file) => {
                let write = || -> anyhow::Result<()> {
                    let mut file = file.lock().unwrap();
                    writeln!(file, "To: {}", config.to)?;
                    writeln!(file, "Subject: {}", body.subject)?;
                    for line in body.text.lines() {
                        writeln!(file, "{}", line)?;
                    }
                    writeln!(file)?;
                    file.flush()?;
                    Ok(())
                };
                write().map_err(TransportError::Send)?;
            }
            None => {
                log::info!(
                    "[Email -> {}] {} ({} alerts)",
                    config.to,
                    body.subject,
                    alerts.len()
                );
            }
        }
        Ok(Ack::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::KV;

    #[tokio::test]
    async fn test_file_output() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let sender = LogSender::to_file(tmp.path()).unwrap();

        let mut config = EmailConfig::default();
        config.to = "ops@example.com".to_string();
        let body = MessageBody {
            subject: "[FIRING:1] test".to_string(),
            text: "line one\nline two".to_string(),
            ..Default::default()
        };
        let context = DeliveryContext {
            receiver: "ops".to_string(),
            group_labels: KV::new(),
            external_url: None,
        };

        sender.deliver(&config, &body, &context, &[]).await.unwrap();

        let written = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(written.contains("To: ops@example.com"));
        assert!(written.contains("Subject: [FIRING:1] test"));
        assert!(written.contains("line two"));
    }
}
