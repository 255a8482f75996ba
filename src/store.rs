// store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("subscription closed")]
    Closed,
}

/// A schemaless record as the store hands it back: a generated id plus a
/// JSON object of fields. The store enforces no shape, so every read goes
/// through the `get_*` accessors and the caller supplies the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

impl Document {
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_field(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_field(name).and_then(Value::as_f64)
    }

    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get_str(name)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    }

    pub fn get_str_list(&self, name: &str) -> Option<Vec<String>> {
        self.get_field(name).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }
}

/// Conjunctive field matcher: every `eq` clause and every `any_of` clause
/// must hold for a document to pass.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    eq: Vec<(String, Value)>,
    any_of: Vec<(String, Vec<Value>)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.eq.push((field.to_string(), value.into()));
        self
    }

    pub fn any_of(mut self, field: &str, values: Vec<Value>) -> Self {
        self.any_of.push((field.to_string(), values));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let null = Value::Null;
        for (field, expected) in &self.eq {
            let actual = doc.fields.get(field).unwrap_or(&null);
            if actual != expected {
                return false;
            }
        }
        for (field, allowed) in &self.any_of {
            let actual = doc.fields.get(field).unwrap_or(&null);
            if !allowed.contains(actual) {
                return false;
            }
        }
        true
    }
}

/// A live snapshot channel. Every delivery is the full matching result set
/// for the subscription's filter; consumers replace state wholesale and must
/// tolerate re-delivery of unchanged documents. Because each snapshot
/// supersedes the previous one, a slow consumer skips intermediates but the
/// next `recv` always returns the result of the latest commit.
///
/// `cancel` is idempotent: calling it twice, or after the channel already
/// closed on its own, is a no-op. Dropping the handle cancels too.
pub struct Subscription {
    rx: watch::Receiver<Vec<Document>>,
    canceller: Arc<dyn Fn() + Send + Sync>,
    cancelled: bool,
}

impl Subscription {
    pub fn new(rx: watch::Receiver<Vec<Document>>, canceller: Arc<dyn Fn() + Send + Sync>) -> Self {
        Subscription {
            rx,
            canceller,
            cancelled: false,
        }
    }

    /// Latest unseen snapshot, or `None` once the channel is closed
    /// (cancelled here, or torn down by the store).
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        if self.cancelled {
            return None;
        }
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            (self.canceller)();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// The remote document store as the core consumes it: append/query plus
/// single-document compare-and-set and push-based change feeds. There are no
/// transactions across collections.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Insert a record under a store-generated id. A top-level
    /// `"timestamp": null` field is a server-timestamp sentinel: the store
    /// replaces it with a monotonically non-decreasing commit time.
    async fn append(&self, collection: &str, fields: Value) -> Result<Document, StoreError>;

    async fn get_once(&self, collection: &str, filter: Filter) -> Result<Vec<Document>, StoreError>;

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Compare-and-set on one document: applies `updates` iff every field in
    /// `expected` currently matches. Returns whether the write applied; a
    /// missing document is `Ok(false)`, not an error. This is the only
    /// primitive that may race on shared fields.
    async fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        expected: Value,
        updates: Value,
    ) -> Result<bool, StoreError>;

    /// Open a change feed delivering the current snapshot immediately and a
    /// fresh snapshot after every mutation of the collection. Snapshots are
    /// observed in commit order within one subscription and a lagging reader
    /// converges on the latest one; nothing is guaranteed across two
    /// subscriptions.
    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<Subscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(fields: Value) -> Document {
        Document {
            id: "d1".to_string(),
            fields,
        }
    }

    #[test]
    fn accessors_return_none_for_missing_and_null_fields() {
        let d = doc(json!({ "title": "Wedding shoot", "budget": 250.0, "note": null }));
        assert_eq!(d.get_str("title"), Some("Wedding shoot"));
        assert_eq!(d.get_f64("budget"), Some(250.0));
        assert_eq!(d.get_str("note"), None);
        assert_eq!(d.get_str("missing"), None);
        assert_eq!(d.get_date("title"), None);
    }

    #[test]
    fn date_accessor_round_trips_rfc3339() {
        let ts = Utc::now();
        let d = doc(json!({ "postedDate": ts.to_rfc3339() }));
        assert_eq!(d.get_date("postedDate"), Some(ts));
    }

    #[test]
    fn filter_eq_and_any_of_are_conjunctive() {
        let d = doc(json!({ "status": "OPEN", "clientId": "c1" }));
        assert!(Filter::new().eq("status", "OPEN").matches(&d));
        assert!(!Filter::new()
            .eq("status", "OPEN")
            .eq("clientId", "someone-else")
            .matches(&d));
        assert!(Filter::new()
            .any_of("clientId", vec![json!("c1"), json!("c2")])
            .matches(&d));
        assert!(!Filter::new()
            .any_of("clientId", vec![json!("c3")])
            .matches(&d));
    }

    #[test]
    fn filter_missing_field_never_matches_eq() {
        let d = doc(json!({ "status": "OPEN" }));
        assert!(!Filter::new().eq("jobId", "j1").matches(&d));
    }
}
