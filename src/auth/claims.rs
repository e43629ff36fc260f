use serde::{Deserialize, Serialize};

/// Claims we read from identity-provider tokens. Anything else the issuer
/// puts in the payload is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,            // user ID
    pub exp: usize,             // expires at (unix timestamp)
    pub iss: String,            // issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>, // "access" | "id" on Cognito
}
