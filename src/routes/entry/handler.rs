use axum::{
    extract::{Extension, Json, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    middleware::AuthUser,
    permissions::require,
    utils::{
        success_to_api_response,
        time::{parse_range_bound, today_start_utc},
    },
};

use super::model::{
    CreateEntryRequest, DateRangeQuery, DeleteMultipleRequest, DeletedCount, ListEntriesQuery,
    MAX_LIST_LIMIT, UpdateEntryRequest, VehicleEntry,
};
use super::photo;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Entry {} not found", id))
}

#[axum::debug_handler]
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_create_entries)?;
    req.validate()?;

    let entry = VehicleEntry::create(&state.pool, req).await?;
    tracing::info!("{} registered entry {}", auth.user.username, entry.id);
    Ok((StatusCode::CREATED, success_to_api_response(entry)))
}

#[axum::debug_handler]
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_view_entries)?;

    let since = query.today.then(today_start_utc);
    let limit = query.limit.map(|l| l.clamp(0, MAX_LIST_LIMIT));
    let entries =
        VehicleEntry::find_all(&state.pool, query.search.as_deref(), since, limit).await?;
    Ok(success_to_api_response(entries))
}

#[axum::debug_handler]
pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_view_entries)?;

    let entry = VehicleEntry::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(success_to_api_response(entry))
}

#[axum::debug_handler]
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_update_entries)?;

    let registers_exit = req.exited_at.is_some();
    let entry = VehicleEntry::update(&state.pool, id, req).await?;
    if registers_exit {
        tracing::info!("{} registered exit for entry {}", auth.user.username, id);
    }
    Ok(success_to_api_response(entry))
}

#[axum::debug_handler]
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_delete_entries)?;

    let entry = VehicleEntry::delete(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    if let Some(ref photo_path) = entry.photo {
        photo::remove(&state.config.upload_dir, photo_path).await;
    }

    tracing::info!("{} deleted entry {}", auth.user.username, id);
    Ok(success_to_api_response(DeletedCount { deleted_count: 1 }))
}

#[axum::debug_handler]
pub async fn delete_multiple(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<DeleteMultipleRequest>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_delete_entries)?;
    if req.ids.is_empty() {
        return Err(AppError::Validation("No entry ids given".into()));
    }

    let purged = VehicleEntry::delete_many(&state.pool, &req.ids).await?;
    photo::remove_all(&state.config.upload_dir, &purged.photos).await;
    tracing::info!(
        "{} bulk-deleted {} of {} requested entries",
        auth.user.username,
        purged.count,
        req.ids.len()
    );
    Ok(success_to_api_response(DeletedCount {
        deleted_count: purged.count,
    }))
}

#[axum::debug_handler]
pub async fn statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_view_statistics)?;

    let stats = VehicleEntry::statistics(&state.pool, today_start_utc()).await?;
    Ok(success_to_api_response(stats))
}

#[axum::debug_handler]
pub async fn date_range(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<DateRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_view_history)?;

    let start = parse_range_bound(&query.start, false, &chrono::Local)?;
    let end = parse_range_bound(&query.end, true, &chrono::Local)?;
    if start > end {
        return Err(AppError::Validation(
            "Range start must not be after range end".into(),
        ));
    }

    let entries = VehicleEntry::find_by_date_range(&state.pool, start, end).await?;
    Ok(success_to_api_response(entries))
}

#[axum::debug_handler]
pub async fn manual_cleanup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_run_cleanup)?;

    let purged = VehicleEntry::delete_all(&state.pool).await?;
    photo::remove_all(&state.config.upload_dir, &purged.photos).await;
    tracing::warn!(
        "Manual cleanup by {} removed {} entries",
        auth.user.username,
        purged.count
    );
    Ok(success_to_api_response(DeletedCount {
        deleted_count: purged.count,
    }))
}

#[axum::debug_handler]
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    require(auth.permissions().can_upload_photos)?;

    let existing = VehicleEntry::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let (ext, data) = photo::read_photo(&mut multipart).await?;

    let file_name = photo::photo_file_name(id, &data, &ext);
    photo::store(&state.config.upload_dir, &file_name, &data).await?;

    let public = photo::public_path(&file_name);
    let entry = VehicleEntry::set_photo(&state.pool, id, &public)
        .await?
        .ok_or_else(|| not_found(id))?;

    if let Some(old) = existing.photo.as_deref().filter(|old| *old != public) {
        photo::remove(&state.config.upload_dir, old).await;
    }

    tracing::info!("{} attached photo {} to entry {}", auth.user.username, public, id);
    Ok(success_to_api_response(entry))
}
