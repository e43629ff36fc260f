use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use super::repo_types::{Recipe, RecipePatch};

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Recipe>>;

    /// Looks up by id only; ownership is checked by the caller.
    async fn get(&self, id: &str) -> anyhow::Result<Option<Recipe>>;

    async fn insert(&self, recipe: &Recipe) -> anyhow::Result<()>;

    /// Applies `patch`, stamps `updated_at` and returns the new row, or `None`
    /// if the recipe no longer exists.
    async fn update(
        &self,
        id: &str,
        patch: &RecipePatch,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<Option<Recipe>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}

const COLUMNS: &str = "id, user_id, title, photo, description, ingredients, calories_per_100g, \
                       created_at, updated_at";

pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM recipes
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list recipes by user")?;
        Ok(rows)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!("SELECT {COLUMNS} FROM recipes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("get recipe")?;
        Ok(row)
    }

    async fn insert(&self, r: &Recipe) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO recipes ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#
        ))
        .bind(&r.id)
        .bind(&r.user_id)
        .bind(&r.title)
        .bind(&r.photo)
        .bind(&r.description)
        .bind(&r.ingredients)
        .bind(r.calories_per_100g)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.db)
        .await
        .context("insert recipe")?;
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        patch: &RecipePatch,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE recipes SET updated_at = ");
        qb.push_bind(updated_at);
        if let Some(title) = &patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(photo) = &patch.photo {
            qb.push(", photo = ").push_bind(photo.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(ingredients) = &patch.ingredients {
            qb.push(", ingredients = ").push_bind(ingredients.clone());
        }
        if let Some(calories) = patch.calories_per_100g {
            qb.push(", calories_per_100g = ").push_bind(calories);
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.push(" RETURNING ").push(COLUMNS);

        let row = qb
            .build_query_as::<Recipe>()
            .fetch_optional(&self.db)
            .await
            .context("update recipe")?;
        Ok(row)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?;
        Ok(done.rows_affected() > 0)
    }
}
