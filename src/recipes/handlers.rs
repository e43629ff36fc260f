use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{
        CaloriesResponse, CreateRecipeRequest, GenerateRecipeRequest, GeneratedRecipe,
        MessageResponse, RecipeList,
    },
    repo_types::{Recipe, RecipePatch},
    services::{load_owned, new_recipe_id, non_empty, parse_patch},
};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiJson},
    images::services::{ext_from_mime, remove_photo, upload_recipe_photo},
    state::AppState,
};

const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/generate", post(generate_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/calories", post(extract_calories))
        .route(
            "/recipes/:id/photo",
            put(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<RecipeList>, ApiError> {
    let recipes = state
        .recipes
        .list_by_user(&user_id)
        .await
        .map_err(ApiError::internal("Failed to list recipes"))?;
    let count = recipes.len();
    Ok(Json(RecipeList { recipes, count }))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = non_empty(body.title).ok_or_else(|| ApiError::bad_request("Title is required"))?;

    let now = OffsetDateTime::now_utc();
    let recipe = Recipe {
        id: new_recipe_id(now),
        user_id,
        title,
        photo: non_empty(body.photo),
        description: non_empty(body.description),
        ingredients: non_empty(body.ingredients),
        calories_per_100g: None,
        created_at: now,
        updated_at: now,
    };

    state
        .recipes
        .insert(&recipe)
        .await
        .map_err(ApiError::internal("Failed to create recipe"))?;

    info!(recipe_id = %recipe.id, user_id = %recipe.user_id, "recipe created");
    let location = format!("/recipes/{}", recipe.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(recipe)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let recipe = load_owned(&state, &user_id, &id, "Failed to get recipe").await?;
    Ok(Json(recipe))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<Json<Recipe>, ApiError> {
    let existing = load_owned(&state, &user_id, &id, "Failed to update recipe").await?;
    let patch = parse_patch(&body)?;
    let updated = apply_patch(&state, &id, &patch, "Failed to update recipe").await?;

    if let Some(previous) = existing.photo.as_deref() {
        if updated.photo.as_deref() != Some(previous) {
            remove_photo(&state, &user_id, &id, previous).await;
        }
    }
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let recipe = load_owned(&state, &user_id, &id, "Failed to delete recipe").await?;

    let removed = state
        .recipes
        .delete(&id)
        .await
        .map_err(ApiError::internal("Failed to delete recipe"))?;
    if !removed {
        return Err(ApiError::not_found("Recipe not found"));
    }

    if let Some(photo) = recipe.photo.as_deref() {
        remove_photo(&state, &user_id, &id, photo).await;
    }

    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(Json(MessageResponse {
        message: "Recipe deleted successfully",
    }))
}

#[instrument(skip(state))]
pub async fn extract_calories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CaloriesResponse>, ApiError> {
    let recipe = load_owned(&state, &user_id, &id, "Failed to extract calories").await?;
    let ingredients = non_empty(recipe.ingredients).ok_or_else(|| {
        ApiError::bad_request("Recipe has no ingredients to extract calories from")
    })?;

    let kcal = state
        .assistant
        .extract_calories(&ingredients)
        .await
        .map_err(ApiError::internal("Failed to extract calories"))?;

    let patch = RecipePatch {
        calories_per_100g: Some(Some(kcal)),
        ..Default::default()
    };
    apply_patch(&state, &id, &patch, "Failed to extract calories").await?;

    info!(recipe_id = %id, kcal, "calories extracted");
    Ok(Json(CaloriesResponse {
        recipe_id: id,
        calories_per_100g: kcal,
        message: "Calories extracted successfully",
    }))
}

#[instrument(skip(state, body))]
pub async fn generate_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<GenerateRecipeRequest>,
) -> Result<Json<GeneratedRecipe>, ApiError> {
    let ingredients: Vec<String> = body
        .ingredients
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if ingredients.is_empty() {
        return Err(ApiError::bad_request("Ingredients array is required"));
    }

    let draft = state
        .assistant
        .generate_recipe(&ingredients)
        .await
        .map_err(ApiError::internal("Failed to generate recipe"))?;

    info!(%user_id, count = ingredients.len(), title = %draft.title, "recipe generated");
    Ok(Json(GeneratedRecipe {
        draft,
        generated_at: OffsetDateTime::now_utc(),
    }))
}

#[instrument(skip(state, headers, body), fields(size = body.len()))]
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Recipe>, ApiError> {
    let recipe = load_owned(&state, &user_id, &id, "Failed to upload photo").await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if ext_from_mime(content_type).is_none() {
        return Err(ApiError::bad_request(
            "Photo must be image/jpeg, image/png, image/webp or image/heic",
        ));
    }
    if body.is_empty() {
        return Err(ApiError::bad_request("Photo body is required"));
    }

    let url = upload_recipe_photo(&state, &user_id, &id, body, content_type)
        .await
        .map_err(ApiError::internal("Failed to upload photo"))?;

    let patch = RecipePatch {
        photo: Some(Some(url.clone())),
        ..Default::default()
    };
    let updated = match apply_patch(&state, &id, &patch, "Failed to upload photo").await {
        Ok(updated) => updated,
        Err(e) => {
            remove_photo(&state, &user_id, &id, &url).await;
            return Err(e);
        }
    };

    if let Some(previous) = recipe.photo.as_deref().filter(|p| *p != url) {
        remove_photo(&state, &user_id, &id, previous).await;
    }
    Ok(Json(updated))
}

async fn apply_patch(
    state: &AppState,
    id: &str,
    patch: &RecipePatch,
    failure: &'static str,
) -> Result<Recipe, ApiError> {
    state
        .recipes
        .update(id, patch, OffsetDateTime::now_utc())
        .await
        .map_err(ApiError::internal(failure))?
        .ok_or_else(|| {
            warn!(recipe_id = %id, "recipe vanished during update");
            ApiError::not_found("Recipe not found")
        })
}
