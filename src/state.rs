//! Request statistics and history shared by every endpoint.
//!
//! Counters and the request log live behind a single mutex so that a request
//! is always visible in both or in neither.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Visit count per request path.
pub type StatsTable = BTreeMap<String, u64>;

/// One fully processed request, as reported by `/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    pub path: String,
    pub verb: String,
    pub body: String,
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Vec<(String, String)>,
}

// Headers go out as `[{"name": "value"}, ...]` to keep duplicates and order.
fn serialize_headers<S>(headers: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    struct Single<'a>(&'a str, &'a str);

    impl Serialize for Single<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(self.0, self.1)?;
            map.end()
        }
    }

    let mut seq = serializer.serialize_seq(Some(headers.len()))?;
    for (name, value) in headers {
        seq.serialize_element(&Single(name, value))?;
    }
    seq.end()
}

#[derive(Debug, Default)]
struct Inner {
    stats: StatsTable,
    history: Vec<RequestRecord>,
}

#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave `Inner` half-updated, so a
    // poisoned mutex is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the path and appends the request to the history in one step.
    pub fn record(&self, path: &str, method: &str, body: &str, headers: Vec<(String, String)>) {
        let mut inner = self.lock();
        *inner.stats.entry(path.to_string()).or_insert(0) += 1;
        inner.history.push(RequestRecord {
            path: path.to_string(),
            verb: method.to_string(),
            body: body.to_string(),
            headers,
        });
    }

    pub fn stats(&self) -> StatsTable {
        self.lock().stats.clone()
    }

    pub fn history(&self) -> Vec<RequestRecord> {
        self.lock().history.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.stats.clear();
        inner.history.clear();
    }

    /// Serializes the stats table under the lock.
    pub fn stats_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.lock().stats)
    }

    /// Serializes the history under the lock.
    pub fn history_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.lock().history)
    }
}
