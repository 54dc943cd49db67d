use meshgraph_core::{EdgeCounters, ServiceIdentity, StatusClass};
use std::collections::BTreeMap;
use tracing::{trace, warn};

use crate::client::Sample;

pub const DESTINATION_SERVICE: &str = "destination_service";
pub const DESTINATION_VERSION: &str = "destination_version";
pub const RESPONSE_CODE: &str = "response_code";

/// Bucketed traffic per destination, plus what was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub destinations: BTreeMap<ServiceIdentity, EdgeCounters>,
    /// Missing destination/code labels, or a non-finite or negative value.
    pub malformed: usize,
    /// Status code outside 2xx..5xx; not counted into `total`.
    pub unknown_status: usize,
    /// Samples whose destination is the querying node itself.
    pub self_invocations: usize,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Groups samples by destination identity and buckets their values by status
/// class. Samples addressed to `exclude` are dropped, so a node never gets an
/// edge to itself.
pub fn aggregate(samples: &[Sample], exclude: Option<&ServiceIdentity>) -> Aggregation {
    let mut out = Aggregation::default();

    for sample in samples {
        let (service, version, code) = match (
            sample.label(DESTINATION_SERVICE),
            sample.label(DESTINATION_VERSION),
            sample.label(RESPONSE_CODE),
        ) {
            (Some(s), Some(v), Some(c)) => (s, v, c),
            _ => {
                warn!("Skipping {:?}, missing destination labels", sample.labels);
                out.malformed += 1;
                continue;
            }
        };

        if !sample.value.is_finite() || sample.value < 0.0 {
            warn!("Skipping {:?}, unusable value {}", sample.labels, sample.value);
            out.malformed += 1;
            continue;
        }

        if exclude.is_some_and(|ex| ex.name == service && ex.version == version) {
            trace!("Dropping self-invocation of {} ({})", service, version);
            out.self_invocations += 1;
            continue;
        }

        let Some(class) = StatusClass::from_code(code) else {
            trace!("Ignoring response code {} for {} ({})", code, service, version);
            out.unknown_status += 1;
            continue;
        };

        out.destinations
            .entry(ServiceIdentity::new(service, version))
            .or_default()
            .record(class, sample.value);
    }

    out
}
