use chrono::{DateTime, Utc};
use meshgraph_core::ServiceIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status codes the traffic queries select.
pub const VALID_RESPONSE_CODES: &str = "[2345][0-9][0-9]";

/// Labels every traffic query groups by.
pub const GROUP_BY: &str = "destination_service,destination_version,response_code";

/// `source_version` value the mesh reports for requests with no internal caller.
pub const OUTSIDE_SOURCE_VERSION: &str = "unknown";

/// The instant a pass queries at, and the rate window behind each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub at: DateTime<Utc>,
    pub range: Duration,
}

impl QueryWindow {
    pub fn new(at: DateTime<Utc>, range: Duration) -> Self {
        Self { at, range }
    }

    /// `now - offset`, with `range` as the rate window.
    pub fn anchored(now: DateTime<Utc>, offset: Duration, range: Duration) -> Self {
        let at = chrono::Duration::from_std(offset)
            .ok()
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(now);
        Self { at, range }
    }

    /// The following window of the same length.
    pub fn advance(&self) -> Self {
        let step = chrono::Duration::from_std(self.range).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            at: self.at + step,
            range: self.range,
        }
    }

    fn range_secs(&self) -> u64 {
        self.range.as_secs().max(1)
    }
}

/// A root traffic signal: a request-count metric labelled by source and
/// destination service/version plus response code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficSignal(String);

impl TrafficSignal {
    pub fn new(metric: impl Into<String>) -> Self {
        Self(metric.into())
    }

    pub fn metric(&self) -> &str {
        &self.0
    }

    /// Per-minute traffic entering the mesh from outside.
    pub fn root_query(&self, window: &QueryWindow) -> String {
        self.rate_query(
            &format!("source_version=\"{}\"", OUTSIDE_SOURCE_VERSION),
            window,
        )
    }

    /// Per-minute traffic leaving `source`.
    pub fn outbound_query(&self, source: &ServiceIdentity, window: &QueryWindow) -> String {
        self.rate_query(
            &format!(
                "source_service=\"{}\",source_version=\"{}\"",
                escape_label(&source.name),
                escape_label(&source.version)
            ),
            window,
        )
    }

    fn rate_query(&self, selector: &str, window: &QueryWindow) -> String {
        format!(
            "sum(rate({}{{{},response_code=~\"{}\"}} [{}s]) * 60) by ({})",
            self.0,
            selector,
            VALID_RESPONSE_CODES,
            window.range_secs(),
            GROUP_BY
        )
    }

    /// Link into the backend's graph UI showing traffic into `destination`.
    pub fn deep_link(&self, server: &str, destination: &ServiceIdentity) -> String {
        let expr = format!(
            "{}{{destination_service=\"{}\",destination_version=\"{}\"}}",
            self.0,
            escape_label(&destination.name),
            escape_label(&destination.version)
        );
        let encoded: String = url::form_urlencoded::byte_serialize(expr.as_bytes()).collect();
        format!(
            "{}/graph?g0.range_input=1h&g0.tab=0&g0.expr={}",
            server.trim_end_matches('/'),
            encoded
        )
    }
}

impl fmt::Display for TrafficSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrafficSignal {
    fn from(metric: &str) -> Self {
        Self::new(metric)
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> QueryWindow {
        QueryWindow::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn root_query_selects_outside_traffic() {
        let q = TrafficSignal::new("istio_request_count").root_query(&window());
        assert_eq!(
            q,
            "sum(rate(istio_request_count{source_version=\"unknown\",response_code=~\"[2345][0-9][0-9]\"} [30s]) * 60) \
             by (destination_service,destination_version,response_code)"
        );
    }

    #[test]
    fn outbound_query_scopes_to_source() {
        let q = TrafficSignal::new("istio_request_count")
            .outbound_query(&ServiceIdentity::new("checkout", "v1"), &window());
        assert!(q.contains("source_service=\"checkout\",source_version=\"v1\""));
        assert!(q.ends_with("by (destination_service,destination_version,response_code)"));
    }

    #[test]
    fn deep_link_is_form_encoded() {
        let link = TrafficSignal::new("istio_request_count").deep_link(
            "http://prom:9090/",
            &ServiceIdentity::new("payments", "v2"),
        );
        assert_eq!(
            link,
            "http://prom:9090/graph?g0.range_input=1h&g0.tab=0&g0.expr=\
             istio_request_count%7Bdestination_service%3D%22payments%22%2Cdestination_version%3D%22v2%22%7D"
        );
    }

    #[test]
    fn anchored_window_subtracts_offset() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let w = QueryWindow::anchored(now, Duration::from_secs(3600), Duration::from_secs(30));
        assert_eq!(w.at, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
        assert_eq!(w.advance().at, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 30).unwrap());
    }

    #[test]
    fn label_values_are_escaped() {
        let q = TrafficSignal::new("m")
            .outbound_query(&ServiceIdentity::new("we\"ird", "v1"), &window());
        assert!(q.contains("source_service=\"we\\\"ird\""));
    }
}
