use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::Recipe;
use crate::assistant::RecipeDraft;

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeList {
    pub recipes: Vec<Recipe>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaloriesResponse {
    pub recipe_id: String,
    pub calories_per_100g: f64,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRecipeRequest {
    #[serde(default)]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    #[serde(flatten)]
    pub draft: RecipeDraft,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}
