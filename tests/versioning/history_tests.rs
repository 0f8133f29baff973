use chrono::{Duration, Utc};
use fhir_store_core::repository::HistoryParams;

/// `HistoryParams` defaults to an unbounded `since` and a zero count, which
/// `read_history` interprets as "use the repository's configured default
/// page size" rather than zero rows.
#[test]
fn default_history_params_have_no_since_bound() {
    let params = HistoryParams::default();
    assert_eq!(params.count, 0);
    assert!(params.since.is_none());
}

/// A `since` bound is carried through unmodified; `read_history` only
/// attaches the `lastUpdated >= $since` clause when one is present.
#[test]
fn since_bound_is_carried_through() {
    let since = Utc::now() - Duration::days(7);
    let params = HistoryParams { count: 50, since: Some(since) };
    assert_eq!(params.since, Some(since));
    assert_eq!(params.count, 50);
}
