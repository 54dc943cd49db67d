use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A service at a specific version. The node key of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Fully qualified form, e.g. `reviews.default.svc.cluster.local (v2)`.
    pub fn qualified(&self) -> String {
        format!("{} ({})", self.name, self.version)
    }

    /// Short form used for labels: the name up to its first `.`.
    pub fn display_name(&self) -> String {
        let bare = self.name.split('.').next().unwrap_or(&self.name);
        format!("{} ({})", bare, self.version)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// Response status class, keyed on the first digit of the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 4] = [
        StatusClass::Success,
        StatusClass::Redirect,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    /// Returns `None` for anything outside 2xx..5xx.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().chars().next() {
            Some('2') => Some(StatusClass::Success),
            Some('3') => Some(StatusClass::Redirect),
            Some('4') => Some(StatusClass::ClientError),
            Some('5') => Some(StatusClass::ServerError),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::Redirect => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "2xx" => Ok(StatusClass::Success),
            "3xx" => Ok(StatusClass::Redirect),
            "4xx" => Ok(StatusClass::ClientError),
            "5xx" => Ok(StatusClass::ServerError),
            other => Err(format!("unknown status class: {}", other)),
        }
    }
}

/// Requests-per-minute on one edge, split by status class.
///
/// `total` always equals the sum of the four buckets when the counters are
/// built through [`EdgeCounters::record`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeCounters {
    pub total: f64,
    pub rate_2xx: f64,
    pub rate_3xx: f64,
    pub rate_4xx: f64,
    pub rate_5xx: f64,
}

impl EdgeCounters {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn record(&mut self, class: StatusClass, value: f64) {
        *self.bucket_mut(class) += value;
        self.total += value;
    }

    pub fn with(mut self, class: StatusClass, value: f64) -> Self {
        self.record(class, value);
        self
    }

    pub fn bucket(&self, class: StatusClass) -> f64 {
        match class {
            StatusClass::Success => self.rate_2xx,
            StatusClass::Redirect => self.rate_3xx,
            StatusClass::ClientError => self.rate_4xx,
            StatusClass::ServerError => self.rate_5xx,
        }
    }

    fn bucket_mut(&mut self, class: StatusClass) -> &mut f64 {
        match class {
            StatusClass::Success => &mut self.rate_2xx,
            StatusClass::Redirect => &mut self.rate_3xx,
            StatusClass::ClientError => &mut self.rate_4xx,
            StatusClass::ServerError => &mut self.rate_5xx,
        }
    }

    pub fn bucket_sum(&self) -> f64 {
        self.rate_2xx + self.rate_3xx + self.rate_4xx + self.rate_5xx
    }

    pub fn has_traffic(&self) -> bool {
        self.total > 0.0
    }
}
