use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Recipe record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,      // "<unix millis>-<9 base36 chars>"
    pub user_id: String, // owner, never changes
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_per_100g: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Partial update. Outer `None` leaves a column alone; `Some(None)` clears it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub photo: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub ingredients: Option<Option<String>>,
    pub calories_per_100g: Option<Option<f64>>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.photo.is_none()
            && self.description.is_none()
            && self.ingredients.is_none()
            && self.calories_per_100g.is_none()
    }
}
