//! Daily energy and macro-nutrient targets.
//!
//! Energy uses the Mifflin–St Jeor BMR scaled by an activity factor and shifted
//! by a goal adjustment. Macros fix protein and fat per kilogram of body weight
//! and give whatever energy is left to carbohydrates.

use serde::Serialize;

use super::repo_types::{ActivityLevel, Gender, Goal};

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARB: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;
const FAT_G_PER_KG: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Macros {
    pub protein_grams: i32,
    pub fat_grams: i32,
    /// Negative when protein and fat alone exceed the daily target.
    pub carb_grams: i32,
}

fn activity_factor(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::Active => 1.725,
        ActivityLevel::VeryActive => 1.9,
    }
}

fn goal_adjustment(goal: Goal) -> f64 {
    match goal {
        Goal::Lose => -0.2,
        Goal::Maintain => 0.0,
        Goal::Gain => 0.2,
    }
}

fn protein_g_per_kg(goal: Goal) -> f64 {
    match goal {
        Goal::Lose => 1.4,
        Goal::Maintain => 2.0,
        Goal::Gain => 2.2,
    }
}

/// Basal metabolic rate in kcal/day.
pub fn basal_metabolic_rate(age: i32, height_cm: f64, weight_kg: f64, gender: Gender) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

/// Daily calorie target, rounded half away from zero.
pub fn compute_daily_calories(
    age: i32,
    height_cm: f64,
    weight_kg: f64,
    gender: Gender,
    activity_level: ActivityLevel,
    goal: Goal,
) -> i32 {
    let scaled = basal_metabolic_rate(age, height_cm, weight_kg, gender) * activity_factor(activity_level);
    let adjusted = scaled + scaled * goal_adjustment(goal);
    adjusted.round() as i32
}

pub fn compute_macros(daily_calories: i32, weight_kg: f64, goal: Goal) -> Macros {
    let protein = weight_kg * protein_g_per_kg(goal);
    let fat = weight_kg * FAT_G_PER_KG;
    let remaining =
        f64::from(daily_calories) - (protein * KCAL_PER_G_PROTEIN + fat * KCAL_PER_G_FAT);
    let carbs = remaining / KCAL_PER_G_CARB;

    Macros {
        protein_grams: protein.round() as i32,
        fat_grams: fat.round() as i32,
        carb_grams: carbs.round() as i32,
    }
}
