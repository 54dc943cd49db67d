use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meshgraph_core::Result;
use std::collections::BTreeMap;

/// One element of an instant vector: a label set and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Sample {
    pub fn new<K, V>(labels: impl IntoIterator<Item = (K, V)>, value: f64) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            value,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Read access to a time-series backend.
#[async_trait]
pub trait MetricsQueryClient: Send + Sync {
    /// Evaluates `expr` at instant `at`. Anything other than an instant
    /// vector is an error.
    async fn instant_query(&self, expr: &str, at: DateTime<Utc>) -> Result<Vec<Sample>>;
}
