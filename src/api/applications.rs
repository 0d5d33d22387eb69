//! Application lifecycle endpoints. All routes require a session token; the
//! authenticated [`Principal`] is passed straight to the service, which makes
//! every authorization decision against freshly read state.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::validation::validate_id;
use super::{ApiError, ApiResponse, AppState, RejectRequest, SubmitApplicationRequest};
use crate::domain::{ApplicationId, Principal, SchoolId};
use crate::models::{Application, ApplicationDetails};

fn application_id(id: i32) -> Result<ApplicationId, ApiError> {
    validate_id(id, "application").map(ApplicationId::new)
}

/// POST /applications
pub async fn submit_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SubmitApplicationRequest>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let school_id = SchoolId::new(validate_id(payload.school_id, "school")?);

    let application = state
        .application_service()
        .submit(principal, school_id, payload.details)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}

/// GET /applications
pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<Application>>>, ApiError> {
    let applications = state.application_service().list(principal).await?;
    Ok(Json(ApiResponse::success(applications)))
}

/// GET /applications/{id}
pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = state
        .application_service()
        .get(principal, application_id(id)?)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}

/// PUT /applications/{id}
pub async fn update_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(details): Json<ApplicationDetails>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = state
        .application_service()
        .update_details(principal, application_id(id)?, details)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}

/// POST /applications/{id}/approve
pub async fn approve_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = state
        .application_service()
        .approve(principal, application_id(id)?)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}

/// POST /applications/{id}/reject
pub async fn reject_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = state
        .application_service()
        .reject(principal, application_id(id)?, &payload.reason)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}

/// DELETE /applications/{id}
/// Withdraws the application; the row is kept with status `withdrawn`.
pub async fn withdraw_application(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = state
        .application_service()
        .withdraw(principal, application_id(id)?)
        .await?;

    Ok(Json(ApiResponse::success(application)))
}
