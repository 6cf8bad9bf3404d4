use std::{fs, path::Path, sync::Arc};

use anyhow::Result;
use clap::Parser;

use crate::{
    conf::{self, Conf},
    global::get_env_or_default,
    notify::{register_builtins, EmailSender, LogSender, Registry},
    template::AlertBatch,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dry notification mode: log deliveries instead of writing them out
    #[arg(short = 'd', long, default_value_t = get_env_or_default("NOTIFYD_DRY", "false")=="true")]
    dry_notify: bool,

    /// Configuration file
    #[arg(short = 'f', long, default_value_t = get_env_or_default("NOTIFYD_CONFIG", "config.yaml"))]
    yaml_file: String,

    /// Alert batches to dispatch, a JSON list
    #[arg(short = 'b', long, default_value_t = get_env_or_default("NOTIFYD_BATCHES", "batches.json"))]
    batches_file: String,

    /// File rendered emails are appended to
    #[arg(short = 'o', long)]
    email_out: Option<String>,

    /// Show JSON schema
    #[arg(short = 'j', long, default_value_t = false)]
    json_schema: bool,
}

pub async fn start() -> Result<()> {
    logforth::stdout().apply();

    let args = Args::parse();
    if args.json_schema {
        println!("{}", conf::json_schema()?);
        return Ok(());
    }

    let f = fs::read(&args.yaml_file)?;
    let conf: Conf = serde_yaml::from_slice(&f)?;

    let sender: Arc<dyn EmailSender> = match (&args.email_out, args.dry_notify) {
        (Some(path), false) => Arc::new(LogSender::to_file(Path::new(path))?),
        _ => Arc::new(LogSender::default()),
    };

    let registry = Registry::new();
    register_builtins(&registry, sender, reqwest::Client::new())?;

    let mut notifiers = Vec::new();
    for receiver in &conf.receivers {
        match registry.build(&receiver.kind, &receiver.config, &conf.options) {
            Ok(notifier) => {
                log::info!(
                    "Notifier [{} / {}] is configured!",
                    receiver.kind,
                    receiver.name
                );
                notifiers.push((receiver.name.clone(), notifier));
            }
            // construction errors stop this receiver, not the process
            Err(e) => log::error!("Receiver [{}] skipped: {}", receiver.name, e),
        }
    }

    let batches: Vec<AlertBatch> = serde_json::from_slice(&fs::read(&args.batches_file)?)?;
    log::info!(
        "Dispatching {} batch(es) through {} notifier(s)",
        batches.len(),
        notifiers.len()
    );

    for (name, notifier) in &notifiers {
        let errs = notifier.notify(&batches).await;
        if errs.is_empty() {
            log::info!("[{} / {}] all deliveries succeeded", notifier.kind(), name);
        }
        for e in errs {
            log::error!("[{} / {}] {}", notifier.kind(), name, e);
        }
    }

    Ok(())
}
