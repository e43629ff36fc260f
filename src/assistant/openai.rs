use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{AssistantError, RecipeAssistant, RecipeDraft};
use crate::config::AssistantConfig;

const CALORIES_SYSTEM_PROMPT: &str = "You are a nutrition expert. Extract the calorie content per 100g from the given ingredients. Return only a number.";
const RECIPE_SYSTEM_PROMPT: &str = "You are a professional chef. Generate a recipe based on the provided ingredients. Return a JSON object with title, description, ingredients (as a formatted string), and instructions.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiAssistant {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(cfg: &AssistantConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build assistant http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }

    async fn complete(
        &self,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Result<String, AssistantError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: user,
                },
            ],
            temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AssistantError::InvalidReply("no choices".into()))?;
        debug!(model = %self.model, reply_len = content.len(), "assistant replied");
        Ok(content)
    }
}

#[async_trait]
impl RecipeAssistant for OpenAiAssistant {
    #[instrument(skip(self, ingredients))]
    async fn extract_calories(&self, ingredients: &str) -> Result<f64, AssistantError> {
        let reply = self
            .complete(
                CALORIES_SYSTEM_PROMPT,
                format!("Calculate calories per 100g for: {ingredients}"),
                0.3,
            )
            .await?;
        parse_calories(&reply)
            .ok_or_else(|| AssistantError::InvalidReply(format!("no number in {reply:?}")))
    }

    #[instrument(skip(self))]
    async fn generate_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, AssistantError> {
        let reply = self
            .complete(
                RECIPE_SYSTEM_PROMPT,
                format!(
                    "Generate a recipe using these ingredients: {}",
                    ingredients.join(", ")
                ),
                0.7,
            )
            .await?;
        parse_recipe(&reply).map_err(|e| AssistantError::InvalidReply(e.to_string()))
    }
}

/// Calorie figure from the reply. A number tagged `kcal`/`cal` wins; otherwise
/// the first number that is not a quantity like `100g` or `250 ml`.
fn parse_calories(reply: &str) -> Option<f64> {
    lazy_static! {
        static ref NUMBER_RE: Regex = Regex::new(r"(\d+(?:[.,]\d+)?)\s*([A-Za-z%]*)").unwrap();
    }
    const QUANTITY_UNITS: &[&str] = &["g", "gr", "gram", "grams", "mg", "kg", "ml", "l", "oz", "%"];

    let candidates: Vec<(f64, String)> = NUMBER_RE
        .captures_iter(reply)
        .filter_map(|c| {
            let value = c[1].replace(',', ".").parse::<f64>().ok()?;
            Some((value, c[2].to_ascii_lowercase()))
        })
        .collect();

    candidates
        .iter()
        .find(|(_, unit)| unit.starts_with("kcal") || unit.starts_with("cal"))
        .or_else(|| {
            candidates
                .iter()
                .find(|(_, unit)| !QUANTITY_UNITS.contains(&unit.as_str()))
        })
        .map(|(value, _)| *value)
}

/// Models like to wrap JSON in a Markdown fence; accept both forms.
fn parse_recipe(reply: &str) -> Result<RecipeDraft, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calories_from_bare_number() {
        assert_eq!(parse_calories("245"), Some(245.0));
        assert_eq!(parse_calories("  187.5\n"), Some(187.5));
    }

    #[test]
    fn calories_from_sentence() {
        assert_eq!(parse_calories("Approximately 320 kcal per 100g."), Some(320.0));
        assert_eq!(parse_calories("ca. 98,4 kcal"), Some(98.4));
    }

    #[test]
    fn calories_skip_portion_sizes() {
        assert_eq!(parse_calories("Per 100g: 250 kcal"), Some(250.0));
        assert_eq!(parse_calories("Per 100 g: 250"), Some(250.0));
        assert_eq!(parse_calories("100 ml of this soup has 42 calories"), Some(42.0));
        assert_eq!(parse_calories("Roughly 12% fat, 180kcal/100g"), Some(180.0));
    }

    #[test]
    fn calories_absent() {
        assert_eq!(parse_calories("Depends on the 100g portion."), None);
        assert_eq!(parse_calories("I cannot determine that."), None);
        assert_eq!(parse_calories(""), None);
    }

    #[test]
    fn recipe_plain_json() {
        let draft = parse_recipe(
            r#"{"title":"Shakshuka","description":"Eggs in tomato","ingredients":"4 eggs\n1 can tomatoes","instructions":"Simmer."}"#,
        )
        .unwrap();
        assert_eq!(draft.title, "Shakshuka");
        assert_eq!(draft.instructions, "Simmer.");
    }

    #[test]
    fn recipe_fenced_json() {
        let reply = "```json\n{\"title\":\"Pesto pasta\",\"description\":\"\",\"ingredients\":\"basil\",\"instructions\":\"Blend.\"}\n```";
        let draft = parse_recipe(reply).unwrap();
        assert_eq!(draft.title, "Pesto pasta");
        assert_eq!(draft.ingredients, "basil");
    }

    #[test]
    fn recipe_missing_title_is_error() {
        assert!(parse_recipe(r#"{"description":"no title"}"#).is_err());
        assert!(parse_recipe("Sure! Here is a recipe").is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let cfg = AssistantConfig {
            api_key: "sk".into(),
            base_url: "https://llm.example/v1".into(),
            model: "gpt-4".into(),
            timeout: std::time::Duration::from_secs(1),
        };
        let assistant = OpenAiAssistant::new(&cfg).unwrap();
        assert_eq!(assistant.endpoint, "https://llm.example/v1/chat/completions");
    }
}
