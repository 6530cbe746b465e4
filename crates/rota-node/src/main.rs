//! # Rota Node
//!
//! HTTP node serving the change request pipeline, the roster, the rule set
//! and the schedule.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use rota_interpret::{ExtractorConfig, HttpLanguageModel, IntentExtractor, KeywordModel, LanguageModel};
use rota_resolver::{ApplierConfig, ChangePipeline, ResolverConfig};
use rota_rules::RuleSet;
use rota_state::InMemoryScheduleStore;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;
mod seed;
mod state;

use config::NodeConfig;
use state::AppState;

fn load_rules(config: &NodeConfig) -> anyhow::Result<RuleSet> {
    let Some(path) = &config.rules_path else {
        return Ok(RuleSet::default_rules());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading rule set from {}", path.display()))?;
    let rules: RuleSet =
        serde_json::from_str(&raw).with_context(|| format!("parsing rule set in {}", path.display()))?;
    rules.validate()?;
    info!(path = %path.display(), rules = rules.rules.len(), "Loaded rule set");
    Ok(rules)
}

fn language_model(config: &NodeConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    match &config.llm.base_url {
        Some(url) => {
            let model = HttpLanguageModel::new(url, config.llm.model.clone(), config.llm.api_key.clone(), config.llm.timeout)?;
            info!(url = %url, model = %config.llm.model, "Using HTTP language model");
            Ok(Arc::new(model))
        }
        None => {
            info!("No LLM_BASE_URL set; using keyword model");
            Ok(Arc::new(KeywordModel::new()?))
        }
    }
}

/// Wire the store, extractor and pipeline, seeding demo data if enabled.
async fn build_state(config: &NodeConfig, today: NaiveDate) -> anyhow::Result<AppState> {
    let store = Arc::new(InMemoryScheduleStore::with_rules(load_rules(config)?));

    if config.seed_demo {
        seed::seed_demo(store.as_ref(), today).await?;
    }

    let extractor = IntentExtractor::new(
        language_model(config)?,
        ExtractorConfig {
            min_confidence: config.min_confidence,
            timeout: config.llm.timeout,
        },
    )?;
    let pipeline = ChangePipeline::new(
        store,
        extractor,
        ResolverConfig::default(),
        ApplierConfig {
            max_retries: config.max_retries,
        },
    );
    Ok(AppState::new(pipeline, config.max_tracked_requests))
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        // Change requests
        .route(
            "/api/change-requests",
            post(api::change_request::submit_change_request).get(api::change_request::list_change_requests),
        )
        .route(
            "/api/change-requests/:id",
            get(api::change_request::get_change_request).delete(api::change_request::cancel_change_request),
        )
        // Roster
        .route(
            "/api/employees",
            get(api::employees::list_employees).post(api::employees::create_employee),
        )
        .route(
            "/api/employees/:number",
            get(api::employees::get_employee)
                .patch(api::employees::update_employee)
                .delete(api::employees::delete_employee),
        )
        // Schedule
        .route("/api/schedules", get(api::schedules::list_schedules))
        .route(
            "/api/schedules/:date",
            get(api::schedules::get_schedule)
                .put(api::schedules::assign_schedule)
                .delete(api::schedules::clear_schedule),
        )
        .route("/api/schedules/:date/history", get(api::schedules::schedule_history))
        // Rules and commits
        .route("/api/rules", get(api::rules::get_rules).put(api::rules::replace_rules))
        .route("/api/commits", get(api::commits::list_commits))
        // WebSocket endpoints
        .route("/ws/schedule", get(api::ws::schedule_stream))
        .route("/ws/change-requests/:id", get(api::ws::request_stream))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(config.log_filter()).context("invalid log filter")?)
        .init();

    info!(config = ?config, "Rota node starting");

    let state = build_state(&config, Utc::now().date_naive()).await?;
    let app = create_router(state);

    let addr = config.listen_addr()?;
    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
