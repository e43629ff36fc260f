use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::{ActivityLevel, Gender, Goal, UserProfile};

/// Body of `PUT /profile` and `POST /onboarding`. A client-sent
/// `dailyCalorieIntake` is not a field here and is dropped on parse.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProfileRequest {
    #[validate(range(min = 13, max = 120, message = "age must be between 13 and 120"))]
    pub age: i32,
    pub gender: Gender,
    #[validate(range(
        min = 100.0,
        max = 250.0,
        message = "heightCm must be between 100 and 250"
    ))]
    pub height_cm: f64,
    #[validate(range(
        min = 30.0,
        max = 300.0,
        message = "weightKg must be between 30 and 300"
    ))]
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTargets {
    pub daily_calorie_intake: i32,
    pub protein_grams: i32,
    pub fat_grams: i32,
    pub carb_grams: i32,
}
