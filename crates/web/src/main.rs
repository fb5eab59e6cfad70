mod metrics;
mod models;

use anyhow::Result;
use askama::Template;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use common::lookup::check_score;
use common::scores::ArtifactCache;
use metrics_exporter_prometheus::PrometheusHandle;
use models::ResultView;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub artifact: ArtifactCache,
    /// `None` disables `/metrics` (tests, or when no recorder is installed).
    pub metrics: Option<PrometheusHandle>,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    /// Missing-artifact banner; when set the form is rendered disabled.
    data_error: Option<String>,
    result: ResultView,
}

#[derive(Template)]
#[template(path = "partials/result.html")]
struct ResultTemplate {
    result: ResultView,
}

fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// --- Handlers ---

async fn index(State(state): State<Arc<AppState>>) -> Response {
    let data_error = state.artifact.load().err().map(|e| e.user_message());
    render(&IndexTemplate {
        data_error,
        result: ResultView::default(),
    })
}

#[derive(Deserialize)]
struct CheckForm {
    #[serde(default)]
    wallet: String,
}

/// One "Check Score" submission. htmx requests get the result partial,
/// plain form posts get the whole page with the result filled in.
async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CheckForm>,
) -> Response {
    let is_htmx = headers.contains_key("HX-Request");

    let table = match state.artifact.load() {
        Ok(table) => table,
        Err(e) => {
            metrics::record_lookup("unavailable");
            return if is_htmx {
                render(&ResultTemplate {
                    result: ResultView::unavailable(e.user_message()),
                })
            } else {
                render(&IndexTemplate {
                    data_error: Some(e.user_message()),
                    result: ResultView::default(),
                })
            };
        }
    };

    let outcome = check_score(&form.wallet, &table);
    metrics::record_lookup(outcome.kind());
    tracing::debug!(outcome = outcome.kind(), "score check");

    let result = ResultView::from(&outcome);
    if is_htmx {
        render(&ResultTemplate { result })
    } else {
        render(&IndexTemplate {
            data_error: None,
            result,
        })
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.artifact.load() {
        Ok(table) => (StatusCode::OK, format!("ok rows={}", table.len())).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => {
            handle.run_upkeep();
            handle.render().into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/check", post(check))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("credit_score_web", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let prom = metrics::init_global()?;

    // Read the artifact before serving; a failure is kept and shown on the page.
    let artifact = ArtifactCache::new(&config.artifact.path);
    let rows = artifact.load().map_or(0, |table| table.len());
    metrics::record_table_rows(rows);

    let state = Arc::new(AppState {
        artifact,
        metrics: Some(prom),
    });

    let web = config.web_or_default();
    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", web.host, web.port).parse()?;
    tracing::info!("credit score page listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
