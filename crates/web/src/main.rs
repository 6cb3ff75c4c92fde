mod metrics;
mod models;

use anyhow::Result;
use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::config::{Config, DEFAULT_CONFIG_PATH};
use common::types::DailyMetricRow;
use metrics_exporter_prometheus::PrometheusHandle;
use models::{BehaviorRow, Filter, Kpis, SentimentOption, TableRow};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8501;

pub struct AppState {
    /// Merged features table, or the rendered error from the startup pipeline run.
    pub data: std::result::Result<Vec<DailyMetricRow>, String>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn from_config(cfg: &Config, prometheus: Option<PrometheusHandle>) -> Self {
        let data = match pipeline::jobs::build_features(cfg) {
            Ok(rows) => {
                ::metrics::gauge!("dashboard_rows_available").set(rows.len() as f64);
                tracing::info!(rows = rows.len(), "features loaded for dashboard");
                Ok(rows)
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to build features");
                Err(format!("{e:#}"))
            }
        };
        Self { data, prometheus }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    total_rows: usize,
    filtered_rows: usize,
    start: String,
    end: String,
    options: Vec<SentimentOption>,
    kpis: Kpis,
    behavior: Vec<BehaviorRow>,
    timeseries_svg: String,
    pnl_box_svg: String,
    rows: Vec<TableRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    message: String,
}

fn render<T: Template>(template: &T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

// --- Handlers ---

async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let rows = match &state.data {
        Ok(rows) => rows,
        Err(message) => {
            return render(
                &ErrorTemplate {
                    message: message.clone(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let filter = Filter::from_pairs(&params);
    let selected = filter.apply(rows);
    let owned: Vec<DailyMetricRow> = selected.iter().map(|r| (*r).clone()).collect();

    let points = pipeline::charts::daily_timeseries(&owned);
    let summaries = pipeline::charts::summarize_by_sentiment(&owned);
    let svgs = pipeline::charts::timeseries_chart(&points)
        .render()
        .and_then(|ts| {
            pipeline::charts::pnl_box_chart(&summaries)
                .render()
                .map(|pnl_box| (ts, pnl_box))
        });
    let (timeseries_svg, pnl_box_svg) = match svgs {
        Ok(svgs) => svgs,
        Err(e) => {
            tracing::error!(error = %e, "chart render failed");
            return render(
                &ErrorTemplate {
                    message: e.to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let template = DashboardTemplate {
        total_rows: rows.len(),
        filtered_rows: selected.len(),
        start: filter.start.map(|d| d.to_string()).unwrap_or_default(),
        end: filter.end.map(|d| d.to_string()).unwrap_or_default(),
        options: models::sentiment_options(rows, &filter),
        kpis: Kpis::from_rows(&selected),
        behavior: models::behavior_rows(&summaries),
        timeseries_svg,
        pnl_box_svg,
        rows: models::table_rows(&selected),
    };
    render(&template, StatusCode::OK)
}

async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let Some(handle) = &state.prometheus else {
        return (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response();
    };
    handle.run_upkeep();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

// --- Router ---

pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn config_path_from_args<I>(mut args: I) -> std::result::Result<PathBuf, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();
    match (args.next().as_deref(), args.next()) {
        (None, _) => Ok(PathBuf::from(DEFAULT_CONFIG_PATH)),
        (Some("--config"), Some(path)) => Ok(PathBuf::from(path)),
        _ => Err("usage: web [--config <path>]".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let config = Config::load_from(&config_path)?;

    common::observability::init("web", &config.general.log_level)?;
    let prometheus = metrics::init_global()?;

    let web_port = config.web.as_ref().map_or(DEFAULT_PORT, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or(DEFAULT_HOST.to_string(), |w| w.host.clone());

    let state = Arc::new(AppState::from_config(&config, Some(prometheus)));

    let app = create_router_with_state(state);
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!(%addr, "dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
