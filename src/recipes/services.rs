use rand::Rng;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::warn;

use super::repo_types::{Recipe, RecipePatch};
use crate::{error::ApiError, state::AppState};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// `<unix millis>-<9 random base36 chars>`, e.g. `1717171717171-k3j9x0q2a`.
pub fn new_recipe_id(now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{millis}-{suffix}")
}

/// Empty strings count as "not provided".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Loads a recipe and checks that `user_id` owns it: 404 if absent, 403 if
/// it belongs to someone else.
pub async fn load_owned(
    state: &AppState,
    user_id: &str,
    recipe_id: &str,
    failure: &'static str,
) -> Result<Recipe, ApiError> {
    let recipe = state
        .recipes
        .get(recipe_id)
        .await
        .map_err(ApiError::internal(failure))?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    if recipe.user_id != user_id {
        warn!(%user_id, %recipe_id, "recipe owned by another user");
        return Err(ApiError::Forbidden("You do not have access to this recipe".into()));
    }
    Ok(recipe)
}

/// Builds a patch from an update body. `id`, `userId`, `createdAt`,
/// `updatedAt` and unknown keys are not writable and are skipped.
pub fn parse_patch(body: &Map<String, Value>) -> Result<RecipePatch, ApiError> {
    let mut patch = RecipePatch::default();
    for (key, value) in body {
        match key.as_str() {
            "title" => match value {
                Value::String(s) if !s.trim().is_empty() => patch.title = Some(s.clone()),
                _ => return Err(ApiError::bad_request("title must be a non-empty string")),
            },
            "photo" => patch.photo = Some(optional_text(key, value)?),
            "description" => patch.description = Some(optional_text(key, value)?),
            "ingredients" => patch.ingredients = Some(optional_text(key, value)?),
            "caloriesPer100g" => {
                patch.calories_per_100g = Some(match value {
                    Value::Null => None,
                    Value::Number(n) => match n.as_f64() {
                        Some(kcal) if kcal >= 0.0 => Some(kcal),
                        _ => {
                            return Err(ApiError::bad_request(
                                "caloriesPer100g must be a non-negative number",
                            ))
                        }
                    },
                    _ => {
                        return Err(ApiError::bad_request(
                            "caloriesPer100g must be a non-negative number",
                        ))
                    }
                })
            }
            _ => {}
        }
    }

    if patch.is_empty() {
        return Err(ApiError::bad_request("No valid fields to update"));
    }
    Ok(patch)
}

fn optional_text(key: &str, value: &Value) -> Result<Option<String>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(non_empty(Some(s.clone()))),
        _ => Err(ApiError::bad_request(format!("{key} must be a string or null"))),
    }
}
