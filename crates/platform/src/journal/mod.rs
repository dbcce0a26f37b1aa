//! Journal subscriptions keyed by syslog identifier
//!
//! The install tool reports progress by writing structured records to the
//! system journal. A [`Journal`] hands out a [`JournalSubscription`] per set
//! of identifiers; records arrive on it in publication order until the
//! subscription is removed or dropped.

mod memory;
mod replay;
mod system;

pub use memory::MemoryJournal;
pub use replay::{EventReplay, ReplaySummary};
pub use system::SystemJournal;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use subi_errors::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Field carrying the syslog identifier of a record
pub const SYSLOG_IDENTIFIER: &str = "SYSLOG_IDENTIFIER";

/// Field carrying the free-text message of a record
pub const MESSAGE: &str = "MESSAGE";

/// One journal record: a flat map of field names to string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalRecord {
    fields: BTreeMap<String, String>,
}

impl JournalRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.get(SYSLOG_IDENTIFIER)
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.get(MESSAGE)
    }

    /// Parse one line of `journalctl --output=json`.
    ///
    /// String values are kept as-is. Binary values, which journalctl prints
    /// as arrays of bytes, are decoded lossily. Other values are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a JSON object.
    pub fn from_json_line(line: &str) -> Result<Self, Error> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)?;
        let mut record = Self::new();
        for (key, value) in raw {
            match value {
                serde_json::Value::String(s) => record.insert(key, s),
                serde_json::Value::Array(items) => {
                    let bytes: Option<Vec<u8>> = items
                        .iter()
                        .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                        .collect();
                    if let Some(bytes) = bytes {
                        record.insert(key, String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                serde_json::Value::Number(n) => record.insert(key, n.to_string()),
                _ => {}
            }
        }
        Ok(record)
    }

    /// Decode the record into a typed view
    ///
    /// # Errors
    ///
    /// Returns an error if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = serde_json::to_value(&self.fields)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JournalRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Where journal records come from
#[derive(Clone)]
pub enum Journal {
    /// The host journal, followed through `journalctl`
    System(SystemJournal),
    /// An in-process bus, used for dry runs and tests
    Memory(MemoryJournal),
}

impl Journal {
    #[must_use]
    pub fn system() -> Self {
        Self::System(SystemJournal::default())
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryJournal::new())
    }

    /// Subscribe to records whose syslog identifier is one of `identifiers`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be followed.
    pub fn listen(&self, identifiers: &[String]) -> Result<JournalSubscription, Error> {
        match self {
            Self::System(journal) => journal.listen(identifiers),
            Self::Memory(journal) => Ok(journal.listen(identifiers)),
        }
    }

    /// The in-memory bus, if this is one
    #[must_use]
    pub fn as_memory(&self) -> Option<&MemoryJournal> {
        match self {
            Self::Memory(journal) => Some(journal),
            Self::System(_) => None,
        }
    }
}

enum Detach {
    Task(JoinHandle<()>),
    Memory { journal: MemoryJournal, id: u64 },
}

/// A live subscription to journal records
pub struct JournalSubscription {
    identifiers: Vec<String>,
    receiver: mpsc::UnboundedReceiver<JournalRecord>,
    detach: Option<Detach>,
}

impl JournalSubscription {
    fn new(
        identifiers: Vec<String>,
        receiver: mpsc::UnboundedReceiver<JournalRecord>,
        detach: Detach,
    ) -> Self {
        Self {
            identifiers,
            receiver,
            detach: Some(detach),
        }
    }

    #[must_use]
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Next record, or `None` once the source has gone away
    pub async fn recv(&mut self) -> Option<JournalRecord> {
        self.receiver.recv().await
    }

    /// A record that is already queued, without waiting
    pub fn try_recv(&mut self) -> Option<JournalRecord> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving. Records not yet delivered are discarded.
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        match self.detach.take() {
            Some(Detach::Task(task)) => task.abort(),
            Some(Detach::Memory { journal, id }) => journal.unsubscribe(id),
            None => {}
        }
        self.receiver.close();
    }
}

impl Drop for JournalSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}
