use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState,
    auth::CurrentUser,
    types::{
        AddProductRequest, DeletedDto, HistoryEntryDto, ProductDto, StockRowDto,
        UpdateQuantityRequest,
    },
    validation,
};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// GET /products?search=
/// Case-insensitive substring match on name or category.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<ProductDto>>>, ApiError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let listings = state.store().list_products(search).await?;

    Ok(Json(ApiResponse::success(
        listings.into_iter().map(ProductDto::from).collect(),
    )))
}

/// GET /product/{id}
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ProductDto>>, ApiError> {
    let id = validation::validate_product_id(id)?;

    let listing = state
        .store()
        .get_product_listing(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;

    Ok(Json(ApiResponse::success(ProductDto::from(listing))))
}

/// POST /product
/// Create a product; the initial quantity becomes the first history
/// entry ({old: 0, new: quantity}) in the same transaction.
pub async fn add_product(
    Extension(user): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddProductRequest>,
) -> Result<Json<ApiResponse<ProductDto>>, ApiError> {
    let name = validation::validate_product_name(&payload.name)?;
    let min_stock = payload.min_stock.unwrap_or(0);

    let id = state
        .store()
        .add_product(
            name,
            payload.category.as_deref(),
            payload.quantity,
            min_stock,
            Some(user.id),
        )
        .await?;

    let product = state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::internal("Product vanished after insert"))?;

    Ok(Json(ApiResponse::success(ProductDto::from_model(
        product,
        Some(user.username),
    ))))
}

/// DELETE /product/{id}
/// Deleting a missing product reports `deleted: 0` rather than failing.
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    let id = validation::validate_product_id(id)?;

    let deleted = state.store().delete_product(id).await?;

    Ok(Json(ApiResponse::success(DeletedDto { deleted })))
}

/// PUT /product/{id}/quantity
pub async fn update_quantity(
    Extension(user): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<ApiResponse<ProductDto>>, ApiError> {
    let id = validation::validate_product_id(id)?;

    state
        .store()
        .update_quantity(
            id,
            payload.new_quantity,
            payload.counterparty_name.as_deref(),
            payload.invoice_number.as_deref(),
            Some(user.id),
        )
        .await?;

    let product = state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;

    Ok(Json(ApiResponse::success(ProductDto::from_model(
        product,
        Some(user.username),
    ))))
}

/// GET /product/{id}/history?start=&end=
/// Newest first. Bounds accept rfc3339 or bare dates.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryEntryDto>>>, ApiError> {
    let id = validation::validate_product_id(id)?;

    let start = query
        .start
        .as_deref()
        .map(|s| validation::normalize_date_bound(s, false))
        .transpose()?;
    let end = query
        .end
        .as_deref()
        .map(|s| validation::normalize_date_bound(s, true))
        .transpose()?;

    let entries = state
        .store()
        .get_history(id, start.as_deref(), end.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(
        entries.into_iter().map(HistoryEntryDto::from).collect(),
    )))
}

/// GET /stock
pub async fn list_stock(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<StockRowDto>>>, ApiError> {
    let rows = state.store().list_stock().await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(StockRowDto::from).collect(),
    )))
}
