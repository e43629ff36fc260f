use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use validator::Validate;

use super::{
    calculator::{compute_daily_calories, compute_macros},
    dto::{NutritionTargets, ProfileResponse, UpsertProfileRequest},
    repo_types::UserProfile,
};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiJson},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(upsert_profile))
        .route("/profile/nutrition", get(get_nutrition))
        .route("/onboarding", post(complete_onboarding))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .profiles
        .get(&user_id)
        .await
        .map_err(ApiError::internal("Failed to get profile"))?;
    Ok(Json(ProfileResponse { profile }))
}

#[instrument(skip(state, body))]
pub async fn upsert_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<UpsertProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = save_profile(&state, user_id, body, "Failed to update profile").await?;
    Ok(Json(ProfileResponse {
        profile: Some(profile),
    }))
}

#[instrument(skip(state, body))]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<UpsertProfileRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let profile = save_profile(&state, user_id, body, "Failed to complete onboarding").await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state))]
pub async fn get_nutrition(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<NutritionTargets>, ApiError> {
    let profile = state
        .profiles
        .get(&user_id)
        .await
        .map_err(ApiError::internal("Failed to get nutrition targets"))?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let macros = compute_macros(profile.daily_calorie_intake, profile.weight_kg, profile.goal);
    Ok(Json(NutritionTargets {
        daily_calorie_intake: profile.daily_calorie_intake,
        protein_grams: macros.protein_grams,
        fat_grams: macros.fat_grams,
        carb_grams: macros.carb_grams,
    }))
}

/// Validates the body, derives the calorie target and upserts the profile.
async fn save_profile(
    state: &AppState,
    user_id: String,
    body: UpsertProfileRequest,
    failure: &'static str,
) -> Result<UserProfile, ApiError> {
    body.validate()?;

    let daily_calorie_intake = compute_daily_calories(
        body.age,
        body.height_cm,
        body.weight_kg,
        body.gender,
        body.activity_level,
        body.goal,
    );
    let now = OffsetDateTime::now_utc();
    let profile = UserProfile {
        user_id,
        age: body.age,
        gender: body.gender,
        height_cm: body.height_cm,
        weight_kg: body.weight_kg,
        activity_level: body.activity_level,
        goal: body.goal,
        daily_calorie_intake,
        created_at: now,
        updated_at: now,
    };

    let stored = state
        .profiles
        .upsert(&profile)
        .await
        .map_err(ApiError::internal(failure))?;

    info!(
        user_id = %stored.user_id,
        activity = %stored.activity_level,
        goal = %stored.goal,
        kcal = stored.daily_calorie_intake,
        "profile saved"
    );
    Ok(stored)
}
