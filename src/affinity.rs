use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

/// Rotation state over the numbered variants of one hostname.
///
/// The trailing digit of the first DNS label, if any, is the current suffix;
/// the rest of the label is the prefix used to build `prefix`, `prefix2`,
/// `prefix3` variants. Suffix 1 means the bare prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostRotation {
    prefix: String,
    rest: String,
    suffix: u32,
}

impl HostRotation {
    pub fn derive(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        let (label, rest) = match host.split_once('.') {
            Some((label, rest)) => (label, rest.to_string()),
            None => (host, String::new()),
        };

        let (prefix, suffix) = match label.chars().last().filter(char::is_ascii_digit) {
            Some(digit) => (
                label[..label.len() - 1].to_string(),
                digit.to_digit(10).unwrap_or(1),
            ),
            None => (label.to_string(), 1),
        };

        Some(Self {
            prefix,
            rest,
            suffix,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Advance the suffix cyclically: 1 -> 2 -> 3 -> 1.
    pub fn advance(&mut self) {
        self.suffix = if self.suffix > 2 { 1 } else { self.suffix + 1 };
    }

    /// The full hostname for the current suffix.
    pub fn hostname(&self) -> String {
        let label = if self.suffix == 1 {
            self.prefix.clone()
        } else {
            format!("{}{}", self.prefix, self.suffix)
        };
        if self.rest.is_empty() {
            label
        } else {
            format!("{}.{}", label, self.rest)
        }
    }
}

/// Best-effort record of the last host variant that worked after a failover,
/// keyed by host prefix.
///
/// Concurrent writers may race; the last writer wins. A stale record only
/// costs an extra failed dispatch before rotation kicks in again, so absence
/// and corruption are both treated as "no affinity", never as an error.
pub trait AffinityStore: Send + Sync {
    fn get(&self, prefix: &str) -> Option<String>;
    fn put(&self, prefix: &str, host: &str);
}

/// File-backed store: one small side file per prefix under a spool directory.
/// Writes go through a temp file and rename, so a record is always read whole.
pub struct FileAffinityStore {
    dir: PathBuf,
}

impl FileAffinityStore {
    pub fn new() -> Self {
        Self::with_dir(std::env::temp_dir())
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(format!(".nimbus_{prefix}"))
    }
}

impl Default for FileAffinityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AffinityStore for FileAffinityStore {
    fn get(&self, prefix: &str) -> Option<String> {
        let host = std::fs::read_to_string(self.record_path(prefix)).ok()?;
        let host = host.trim();
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }

    fn put(&self, prefix: &str, host: &str) {
        let path = self.record_path(prefix);
        let result = tempfile::NamedTempFile::new_in(&self.dir)
            .and_then(|mut file| {
                file.write_all(host.as_bytes())?;
                Ok(file)
            })
            .and_then(|file| file.persist(&path).map_err(|err| err.error));

        if let Err(err) = result {
            tracing::warn!("failed to record affinity for {}: {}", prefix, err);
        }
    }
}

/// In-memory store for tests and for deployments that disable persistence.
#[derive(Debug, Default)]
pub struct MemoryAffinityStore {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryAffinityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clone for MemoryAffinityStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl AffinityStore for MemoryAffinityStore {
    fn get(&self, prefix: &str) -> Option<String> {
        self.records.read().get(prefix).cloned()
    }

    fn put(&self, prefix: &str, host: &str) {
        self.records
            .write()
            .insert(prefix.to_string(), host.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation(url: &str) -> HostRotation {
        HostRotation::derive(&Url::parse(url).unwrap()).unwrap()
    }

    #[test]
    fn derive_without_trailing_digit() {
        let r = rotation("http://iovip.example.com/path");
        assert_eq!(r.prefix(), "iovip");
        assert_eq!(r.hostname(), "iovip.example.com");
    }

    #[test]
    fn derive_with_trailing_digit() {
        let r = rotation("http://host2.example.com/path");
        assert_eq!(r.prefix(), "host");
        assert_eq!(r.hostname(), "host2.example.com");
    }

    #[test]
    fn advance_cycles_through_three_variants() {
        // suffix 1 renders as the bare prefix; the dispatch loop uses the
        // caller's URL as-is for the first attempt
        let mut r = rotation("http://host1.example.com/");
        assert_eq!(r.hostname(), "host.example.com");

        r.advance();
        assert_eq!(r.hostname(), "host2.example.com");
        r.advance();
        assert_eq!(r.hostname(), "host3.example.com");
        r.advance();
        assert_eq!(r.hostname(), "host.example.com");
        r.advance();
        assert_eq!(r.hostname(), "host2.example.com");
    }

    #[test]
    fn single_label_host() {
        let r = rotation("http://localhost/");
        assert_eq!(r.prefix(), "localhost");
        assert_eq!(r.hostname(), "localhost");
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAffinityStore::with_dir(dir.path().to_path_buf());

        assert_eq!(store.get("host"), None);
        store.put("host", "host3.example.com");
        assert_eq!(store.get("host"), Some("host3.example.com".to_string()));

        store.put("host", "host2.example.com");
        assert_eq!(store.get("host"), Some("host2.example.com".to_string()));
    }

    #[test]
    fn memory_store_shares_records_across_clones() {
        let store = MemoryAffinityStore::new();
        let clone = store.clone();
        store.put("host", "host2.example.com");
        assert_eq!(clone.get("host"), Some("host2.example.com".to_string()));
    }
}
