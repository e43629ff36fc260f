use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai;

/// A recipe proposed by the assistant; not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("assistant returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("assistant reply unusable: {0}")]
    InvalidReply(String),
}

/// LLM-backed helpers used by the recipe endpoints.
#[async_trait]
pub trait RecipeAssistant: Send + Sync {
    /// Estimated kcal per 100 g for free-text ingredients.
    async fn extract_calories(&self, ingredients: &str) -> Result<f64, AssistantError>;

    async fn generate_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, AssistantError>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Answers with a fixed calorie figure and echoes ingredients into drafts.
    /// `calories: None` makes extraction fail.
    pub struct ScriptedAssistant {
        pub calories: Option<f64>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl Default for ScriptedAssistant {
        fn default() -> Self {
            Self {
                calories: Some(245.5),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RecipeAssistant for ScriptedAssistant {
        async fn extract_calories(&self, ingredients: &str) -> Result<f64, AssistantError> {
            self.prompts.lock().unwrap().push(ingredients.to_string());
            self.calories
                .ok_or_else(|| AssistantError::InvalidReply("no number in reply".into()))
        }

        async fn generate_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, AssistantError> {
            self.prompts.lock().unwrap().push(ingredients.join(", "));
            Ok(RecipeDraft {
                title: format!("{} bake", ingredients[0]),
                description: "Quick weeknight dish".into(),
                ingredients: ingredients.join("\n"),
                instructions: "Combine and bake for 20 minutes.".into(),
            })
        }
    }
}
