use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{ProfileRow, UserProfile};

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;

    /// Inserts or replaces the user's profile. An existing `created_at` is kept;
    /// the stored record is returned.
    async fn upsert(&self, profile: &UserProfile) -> anyhow::Result<UserProfile>;
}

const COLUMNS: &str = "user_id, age, gender, height_cm, weight_kg, activity_level, goal, \
                       daily_calorie_intake, created_at, updated_at";

pub struct PgProfileRepo {
    db: PgPool,
}

impl PgProfileRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepo for PgProfileRepo {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("select profile")?;

        row.map(UserProfile::try_from)
            .transpose()
            .context("decode profile row")
    }

    async fn upsert(&self, p: &UserProfile) -> anyhow::Result<UserProfile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            INSERT INTO user_profiles ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                age = EXCLUDED.age,
                gender = EXCLUDED.gender,
                height_cm = EXCLUDED.height_cm,
                weight_kg = EXCLUDED.weight_kg,
                activity_level = EXCLUDED.activity_level,
                goal = EXCLUDED.goal,
                daily_calorie_intake = EXCLUDED.daily_calorie_intake,
                updated_at = EXCLUDED.updated_at
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&p.user_id)
        .bind(p.age)
        .bind(p.gender.as_str())
        .bind(p.height_cm)
        .bind(p.weight_kg)
        .bind(p.activity_level.as_str())
        .bind(p.goal.as_str())
        .bind(p.daily_calorie_intake)
        .bind(p.created_at)
        .bind(p.updated_at)
        .fetch_one(&self.db)
        .await
        .context("upsert profile")?;

        UserProfile::try_from(row).context("decode profile row")
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryProfileRepo {
        rows: Mutex<HashMap<String, UserProfile>>,
    }

    #[async_trait]
    impl ProfileRepo for MemoryProfileRepo {
        async fn get(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
            Ok(self.rows.lock().unwrap().get(user_id).cloned())
        }

        async fn upsert(&self, profile: &UserProfile) -> anyhow::Result<UserProfile> {
            let mut rows = self.rows.lock().unwrap();
            let mut stored = profile.clone();
            if let Some(existing) = rows.get(&profile.user_id) {
                stored.created_at = existing.created_at;
            }
            rows.insert(stored.user_id.clone(), stored.clone());
            Ok(stored)
        }
    }
}
