use anyhow::Result;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    describe_gauge!(
        "credit_score_web_build_info",
        "Build info for the credit score page (value is always 1)."
    );
    describe_gauge!(
        "credit_score_table_rows",
        "Wallets in the loaded score artifact (0 when it failed to load)."
    );
    describe_counter!(
        "credit_score_lookups_total",
        "Score checks by outcome: found, not_found, empty_input, unavailable."
    );
}

/// Install a global Prometheus recorder exactly once and return a handle for rendering `/metrics`.
///
/// `install_recorder` leaves upkeep to the caller; `/metrics` runs it on each scrape.
pub fn init_global() -> Result<PrometheusHandle> {
    let handle = match PROM_HANDLE.get() {
        Some(h) => h.clone(),
        None => {
            describe();
            let h = PrometheusBuilder::new().install_recorder()?;
            PROM_HANDLE.get_or_init(|| h).clone()
        }
    };

    let git_sha = std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_string());
    ::metrics::gauge!(
        "credit_score_web_build_info",
        "version" => env!("CARGO_PKG_VERSION"),
        "git_sha" => git_sha,
    )
    .set(1.0);

    Ok(handle)
}

pub fn record_lookup(outcome: &'static str) {
    ::metrics::counter!("credit_score_lookups_total", "outcome" => outcome).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_table_rows(rows: usize) {
    ::metrics::gauge!("credit_score_table_rows").set(rows as f64);
}
