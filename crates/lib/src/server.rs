//! Webhook HTTP server: receives inbound message events and runs the dispatch
//! pipeline (account check → route lookup → group size → inline or deferred).

use crate::config::{self, Config};
use crate::dispatch::{decide, Delivery};
use crate::event::{relay_text, InboundEvent};
use crate::membership::{HttpMembershipStore, MembershipResolver};
use crate::provider::ProviderClient;
use crate::reply::ResponseDocument;
use crate::routing::RoutingTable;
use crate::worker::{DeliveryJob, WorkerPool};
use anyhow::{Context, Result};
use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the webhook server. Everything here is immutable after
/// startup; request handling never takes a lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub routes: Arc<RoutingTable>,
    pub membership: Arc<dyn MembershipResolver>,
    pub pool: Arc<WorkerPool>,
}

/// Build the router: `POST /sms` webhook, `GET /` health probe.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/sms", post(sms_webhook))
        .with_state(state)
}

fn xml_response(status: StatusCode, doc: &ResponseDocument) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/xml")],
        doc.to_xml(),
    )
        .into_response()
}

fn server_error(detail: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, detail.to_string()).into_response()
}

/// POST /sms — one inbound event. All pre-dispatch failures (account mismatch,
/// unknown destination, membership query failure) reject the request before any
/// send is attempted; deferred-path send failures never reach this handler.
async fn sms_webhook(
    State(state): State<AppState>,
    Form(event): Form<InboundEvent>,
) -> Response {
    if event.account_sid != state.config.account.account_sid {
        log::warn!("rejected event: account sid mismatch (got {:?})", event.account_sid);
        return server_error("invalid account sid");
    }

    let Some(route) = state.routes.lookup(&event.to) else {
        log::warn!("rejected event: no route for destination {:?}", event.to);
        return server_error("no route for destination");
    };

    let count = match state.membership.member_count(route.group_id).await {
        Ok(count) => count,
        Err(e) => {
            log::error!("member count for group {} failed: {}", route.group_id, e);
            return server_error("membership query failed");
        }
    };

    let text = relay_text(&event.from, &event.body);
    match decide(count, state.config.delivery.inline_limit) {
        Delivery::Inline => {
            let members = match state.membership.member_addresses(route.group_id).await {
                Ok(members) => members,
                Err(e) => {
                    log::error!("member list for group {} failed: {}", route.group_id, e);
                    return server_error("membership query failed");
                }
            };
            log::info!(
                "inline delivery: group {} ({}), {} member(s)",
                route.group_id,
                route.name,
                members.len()
            );
            let doc = ResponseDocument::build(&event.from, &text, members);
            xml_response(StatusCode::OK, &doc)
        }
        Delivery::Deferred => {
            let job = DeliveryJob::new(&event.from, &text, route.clone());
            let job_id = job.id.clone();
            match state.pool.submit(job) {
                Ok(()) => {
                    log::info!(
                        "deferred delivery: group {} ({}), {} member(s), job {}",
                        route.group_id,
                        route.name,
                        count,
                        job_id
                    );
                    xml_response(StatusCode::OK, &ResponseDocument::empty())
                }
                Err(e) => {
                    log::error!("deferred submit for group {} failed: {}", route.group_id, e);
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
        "routes": state.routes.len(),
        "workers": state.config.delivery.workers,
    }))
}

/// Run the webhook server; binds to config.server.bind:config.server.port.
/// Validates config, builds the routing table, store client, provider client,
/// and worker pool, then blocks until shutdown (SIGINT/SIGTERM). Queued jobs
/// are drained before returning.
pub async fn run_server(config: Config) -> Result<()> {
    config.validate()?;

    let routes = RoutingTable::from_routes(config.routes.clone())
        .context("building routing table")?;
    let auth_token = config::resolve_auth_token(&config)
        .context("resolving provider auth token")?;

    let membership: Arc<dyn MembershipResolver> = Arc::new(
        HttpMembershipStore::new(
            &config.membership.base_url,
            Duration::from_secs(config.membership.timeout_secs),
        )
        .context("building membership store client")?,
    );
    let provider = Arc::new(
        ProviderClient::new(
            &config.provider.base_url,
            &config.account.account_sid,
            &auth_token,
            Duration::from_secs(config.provider.timeout_secs),
        )
        .context("building provider client")?,
    );

    let pool = Arc::new(WorkerPool::start(
        config.delivery.workers,
        config.delivery.queue_depth,
        membership.clone(),
        provider,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        routes: Arc::new(routes),
        membership,
        pool: pool.clone(),
    };

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {} ({} route(s))", bind_addr, state.routes.len());

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;

    // The server no longer accepts events; drain whatever is already queued.
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown().await,
        Err(_) => log::warn!("worker pool still shared at shutdown; queued jobs may be dropped"),
    }
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining delivery queue");
}
