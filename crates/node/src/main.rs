use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use registry::{ChainContext, ChainParams};
use shared::{
    domain::{Address, HouseId, HouseRecord},
    error::{ApiError, ErrorCode},
    protocol::{BalanceResponse, CommitOutcome, ManagerResponse, SubmitEnvelope},
};
use storage::RegistryStore;

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    ctx: ChainContext,
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let store = RegistryStore::new(&settings.database_url)
        .await
        .map_err(|error| {
            error!(
                database_url = %settings.database_url,
                %error,
                "failed to open registry database"
            );
            error
        })?;

    let mut funded = 0usize;
    for account in &settings.genesis {
        if store.seed_account(account.address, account.balance).await? {
            funded += 1;
        }
    }
    info!(
        manager = %settings.manager,
        genesis_accounts = settings.genesis.len(),
        newly_funded = funded,
        "registry ready"
    );

    let ctx = ChainContext {
        store,
        params: ChainParams {
            manager: settings.manager,
            submission_fee: settings.submission_fee,
        },
    };
    let app = build_router(Arc::new(AppState { ctx }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/chain/manager", get(get_manager))
        .route("/accounts/:address/balance", get(get_balance))
        .route("/houses", get(get_houses_by_owner))
        .route("/houses/listed", get(get_listed_houses))
        .route("/houses/:house_id", get(get_house))
        .route("/submit", post(post_submit))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.ctx.store.health_check().await.map_err(internal)?;
    Ok("ok")
}

async fn get_manager(State(state): State<Arc<AppState>>) -> Json<ManagerResponse> {
    Json(ManagerResponse {
        manager: registry::manager(&state.ctx),
    })
}

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let address = parse_address(&address)?;
    let balance = registry::balance(&state.ctx, address)
        .await
        .map_err(internal)?;
    Ok(Json(BalanceResponse { address, balance }))
}

async fn get_house(
    State(state): State<Arc<AppState>>,
    Path(house_id): Path<u64>,
) -> ApiResult<Json<HouseRecord>> {
    let record = registry::house(&state.ctx, HouseId(house_id))
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(
                    ErrorCode::NotFound,
                    format!("no house with id {house_id}"),
                )),
            )
        })?;
    Ok(Json(record))
}

async fn get_houses_by_owner(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<HouseRecord>>> {
    let owner = parse_address(&query.owner)?;
    let houses = registry::houses_owned_by(&state.ctx, owner)
        .await
        .map_err(internal)?;
    Ok(Json(houses))
}

async fn get_listed_houses(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<HouseRecord>>> {
    let houses = registry::listed_houses(&state.ctx)
        .await
        .map_err(internal)?;
    Ok(Json(houses))
}

async fn post_submit(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<SubmitEnvelope>,
) -> ApiResult<Json<CommitOutcome>> {
    info!(
        submission_id = %envelope.submission_id,
        caller = %envelope.caller,
        value = %envelope.value,
        "submission received"
    );
    let outcome = registry::submit(&state.ctx, &envelope)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

fn parse_address(raw: &str) -> Result<Address, (StatusCode, Json<ApiError>)> {
    raw.parse().map_err(|error| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("invalid address {raw:?}: {error}"),
            )),
        )
    })
}

fn internal(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, err.to_string())),
    )
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
