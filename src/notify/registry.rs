use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;

use super::{ConfigError, Notifier};
use crate::Options;

/// Builds a notifier from an opaque receiver value. The factory performs
/// the kind-specific shape validation once, at construction.
pub type NotifierFactory =
    Arc<dyn Fn(&Value, &Options) -> Result<Arc<dyn Notifier>, ConfigError> + Send + Sync>;

/// Maps a notifier kind name to its factory. Built once at startup and
/// passed by reference to whoever constructs notifiers; registrations all
/// happen before the first lookup.
#[derive(Default)]
pub struct Registry {
    factories: DashMap<String, NotifierFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a factory under a kind name. A duplicate kind is a
    /// configuration error, not a silent overwrite.
    pub fn register(&self, kind: &str, factory: NotifierFactory) -> Result<(), ConfigError> {
        match self.factories.entry(kind.to_string()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateKind(kind.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(factory);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, kind: &str) -> Option<NotifierFactory> {
        self.factories.get(kind).map(|f| Arc::clone(f.value()))
    }

    /// Resolves the kind and runs its factory in one step.
    pub fn build(
        &self,
        kind: &str,
        value: &Value,
        opts: &Options,
    ) -> Result<Arc<dyn Notifier>, ConfigError> {
        let factory = self
            .lookup(kind)
            .ok_or_else(|| ConfigError::UnknownKind(kind.to_string()))?;
        factory(value, opts)
    }
}
