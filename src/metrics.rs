use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, HistogramOpts,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static INTERACTIONS_RECORDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "interactions_recorded_total",
        "Citizen messages classified and stored",
        &["category", "sentiment"]
    )
    .expect("register interactions_recorded_total")
});

pub static DASHBOARD_RESOLUTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "dashboard_resolutions_total",
        "Dashboard renders by the data source that was selected",
        &["origin"]
    )
    .expect("register dashboard_resolutions_total")
});

pub static EXTERNAL_FETCH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "external_fetch_failures_total",
        "Failed or unconfigured external widget data fetches"
    )
    .expect("register external_fetch_failures_total")
});

pub static BACKEND_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "backend_failures_total",
        "Backend row store calls that failed",
        &["operation"]
    )
    .expect("register backend_failures_total")
});

pub static CACHE_PARSE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cache_parse_failures_total",
        "Reads of the local cache slot that held malformed JSON"
    )
    .expect("register cache_parse_failures_total")
});

pub static CACHED_INTERACTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "cached_interactions",
        "Records in the local cache slot at the last poll"
    )
    .expect("register cached_interactions")
});

pub static AGGREGATION_TIME_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("aggregation_time_seconds", "Histogram of dashboard aggregation durations")
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]);
    register_histogram_vec!(opts, &["origin"]).expect("register aggregation_time_seconds")
});

pub fn gather_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
