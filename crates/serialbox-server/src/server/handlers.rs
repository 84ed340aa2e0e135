use std::{collections::BTreeMap, sync::Arc, time::Instant};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serialbox::{
    AllocationRequest, PoolCopy, RequestContext, SerialBox,
    model::{
        ContentType, NewPool, NewResponseRule, NewSequentialRegion, Pool, PoolUpdate,
        RegionUpdate, ResponseRule, SequentialRegion,
    },
};

use super::{error::ApiError, telemetry};

pub type AppState = Arc<SerialBox>;

type ApiResult<T> = Result<T, ApiError>;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Default, Deserialize)]
pub struct PoolFilter {
    pub pool: Option<String>,
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn mime(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Xml => "application/xml",
        ContentType::Json => "application/json",
        ContentType::Yaml => "application/yaml",
        ContentType::Csv => "text/csv",
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The first `x-forwarded-for` hop, else the `Host` the request was sent to.
fn remote_host(headers: &HeaderMap) -> Option<String> {
    header_value(headers, FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(headers, header::HOST))
        .map(str::to_owned)
}

/// Runs a library call on tokio's blocking pool.
async fn blocking<T, F>(serialbox: AppState, call: F) -> ApiResult<T>
where
    F: FnOnce(&SerialBox) -> serialbox::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || call(&serialbox)).await??)
}

/// `GET /allocate/{pool}/{size}?region=&format=`
///
/// Every query parameter is forwarded to response rule tasks. Without a
/// response rule for `format` the JSON response record is returned;
/// otherwise the rule's output is returned with the matching content type.
pub async fn allocate(
    State(serialbox): State<AppState>,
    Path((pool, size)): Path<(String, u64)>,
    Query(mut params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let started = Instant::now();
    let content_type = match params.get("format") {
        Some(format) => format.parse()?,
        None => ContentType::Json,
    };
    let mut request = AllocationRequest::new(pool, size);
    request.region = params.remove("region").filter(|r| !r.is_empty());
    let ctx = RequestContext {
        remote_host: remote_host(&headers),
        params,
    };

    let requested = request.size;
    let outcome = blocking(serialbox, move |sb| {
        sb.allocate_for(&ctx, &request, content_type)
    })
    .await;
    telemetry::record_allocation_duration(started.elapsed().as_secs_f64() * 1000.0);
    let allocation = outcome.inspect_err(|e| telemetry::increment_allocation_errors(e.kind()))?;

    let response = &allocation.response;
    telemetry::record_allocation(&response.pool, response.size_granted, response.fulfilled);
    tracing::info!(
        pool = %response.pool,
        region = %response.region,
        requested,
        granted = response.size_granted,
        fulfilled = response.fulfilled,
        "allocated"
    );

    Ok(match allocation.payload {
        Some(payload) => ([(header::CONTENT_TYPE, mime(content_type))], payload).into_response(),
        None => Json(allocation.response).into_response(),
    })
}

pub async fn list_pools(State(serialbox): State<AppState>) -> ApiResult<Json<Vec<Pool>>> {
    blocking(serialbox, |sb| sb.admin().list_pools()).await.map(Json)
}

pub async fn create_pool(
    State(serialbox): State<AppState>,
    Json(new): Json<NewPool>,
) -> ApiResult<(StatusCode, Json<Pool>)> {
    let pool = blocking(serialbox, move |sb| sb.admin().create_pool(new)).await?;
    Ok((StatusCode::CREATED, Json(pool)))
}

pub async fn get_pool(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
) -> ApiResult<Json<Pool>> {
    blocking(serialbox, move |sb| sb.admin().get_pool(&machine_name))
        .await
        .map(Json)
}

pub async fn update_pool(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
    Json(update): Json<PoolUpdate>,
) -> ApiResult<Json<Pool>> {
    blocking(serialbox, move |sb| {
        sb.admin().update_pool(&machine_name, update)
    })
    .await
    .map(Json)
}

pub async fn delete_pool(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
) -> ApiResult<Json<Pool>> {
    blocking(serialbox, move |sb| sb.admin().delete_pool(&machine_name))
        .await
        .map(Json)
}

pub async fn copy_pool(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
) -> ApiResult<(StatusCode, Json<PoolCopy>)> {
    let copy = blocking(serialbox, move |sb| sb.admin().copy_pool(&machine_name)).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

pub async fn list_regions(
    State(serialbox): State<AppState>,
    Query(filter): Query<PoolFilter>,
) -> ApiResult<Json<Vec<SequentialRegion>>> {
    blocking(serialbox, move |sb| {
        sb.admin().list_regions(filter.pool.as_deref())
    })
    .await
    .map(Json)
}

pub async fn create_region(
    State(serialbox): State<AppState>,
    Json(new): Json<NewSequentialRegion>,
) -> ApiResult<(StatusCode, Json<SequentialRegion>)> {
    let region = blocking(serialbox, move |sb| sb.admin().create_region(new)).await?;
    Ok((StatusCode::CREATED, Json(region)))
}

pub async fn get_region(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
) -> ApiResult<Json<SequentialRegion>> {
    blocking(serialbox, move |sb| sb.admin().get_region(&machine_name))
        .await
        .map(Json)
}

pub async fn update_region(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
    Json(update): Json<RegionUpdate>,
) -> ApiResult<Json<SequentialRegion>> {
    blocking(serialbox, move |sb| {
        sb.admin().update_region(&machine_name, update)
    })
    .await
    .map(Json)
}

pub async fn delete_region(
    State(serialbox): State<AppState>,
    Path(machine_name): Path<String>,
) -> ApiResult<Json<SequentialRegion>> {
    blocking(serialbox, move |sb| sb.admin().delete_region(&machine_name))
        .await
        .map(Json)
}

pub async fn list_response_rules(
    State(serialbox): State<AppState>,
    Query(filter): Query<PoolFilter>,
) -> ApiResult<Json<Vec<ResponseRule>>> {
    blocking(serialbox, move |sb| {
        sb.admin().list_response_rules(filter.pool.as_deref())
    })
    .await
    .map(Json)
}

pub async fn create_response_rule(
    State(serialbox): State<AppState>,
    Json(new): Json<NewResponseRule>,
) -> ApiResult<(StatusCode, Json<ResponseRule>)> {
    let rule = blocking(serialbox, move |sb| sb.admin().create_response_rule(new)).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn delete_response_rule(
    State(serialbox): State<AppState>,
    Path((pool, content_type)): Path<(String, String)>,
) -> ApiResult<Json<ResponseRule>> {
    let content_type: ContentType = content_type.parse()?;
    blocking(serialbox, move |sb| {
        sb.admin().delete_response_rule(&pool, content_type)
    })
    .await
    .map(Json)
}

pub async fn list_responses(
    State(serialbox): State<AppState>,
    Query(filter): Query<PoolFilter>,
) -> ApiResult<Json<Vec<serialbox::model::Response>>> {
    blocking(serialbox, move |sb| {
        sb.admin().list_responses(filter.pool.as_deref())
    })
    .await
    .map(Json)
}

pub async fn get_response(
    State(serialbox): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serialbox::model::Response>> {
    blocking(serialbox, move |sb| sb.admin().get_response(id))
        .await
        .map(Json)
}
