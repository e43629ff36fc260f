use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Stores a recipe photo and returns its public URL.
pub async fn upload_recipe_photo(
    st: &AppState,
    user_id: &str,
    recipe_id: &str,
    body: Bytes,
    content_type: &str,
) -> anyhow::Result<String> {
    anyhow::ensure!(!body.is_empty(), "empty image body");
    let ext = ext_from_mime(content_type)
        .with_context(|| format!("unsupported content type {content_type}"))?;

    let key = format!("recipes/{}/{}-{}.{}", user_id, recipe_id, Uuid::new_v4(), ext);
    let size = body.len();
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    info!(%user_id, %recipe_id, %key, size, "recipe photo stored");
    Ok(format!("{}/{}", st.config.photos.public_base_url, key))
}

/// Deletes the object behind `photo_url` if it was uploaded for this recipe.
/// Failures are logged and swallowed.
pub async fn remove_photo(st: &AppState, user_id: &str, recipe_id: &str, photo_url: &str) {
    let Some(key) =
        owned_photo_key(&st.config.photos.public_base_url, user_id, recipe_id, photo_url)
    else {
        return;
    };
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete recipe photo");
    }
}

/// Object key for photos uploaded for `recipe_id` of `user_id`; `None` for
/// external links and for objects belonging to other recipes or users.
pub fn owned_photo_key<'a>(
    public_base_url: &str,
    user_id: &str,
    recipe_id: &str,
    photo_url: &'a str,
) -> Option<&'a str> {
    let key = photo_url
        .strip_prefix(public_base_url)
        .and_then(|rest| rest.strip_prefix('/'))?;
    let name = key
        .strip_prefix("recipes/")?
        .strip_prefix(user_id)?
        .strip_prefix('/')?
        .strip_prefix(recipe_id)?
        .strip_prefix('-')?;
    (!name.is_empty() && !name.contains('/')).then_some(key)
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    let mime = ct.split(';').next().unwrap_or("").trim();
    match mime {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("image/png; charset=binary"), Some("png"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[test]
    fn test_owned_photo_key() {
        let base = "https://cdn.test";
        let key = |url| owned_photo_key(base, "u1", "r1", url);
        assert_eq!(key("https://cdn.test/recipes/u1/r1-x.jpg"), Some("recipes/u1/r1-x.jpg"));
        assert_eq!(key("https://cdn.test/other/file.jpg"), None);
        assert_eq!(key("https://cdn.test.evil/recipes/u1/r1-x.jpg"), None);
        assert_eq!(key("https://images.example.com/recipes/u1/r1-x.jpg"), None);
        // someone else's objects
        assert_eq!(key("https://cdn.test/recipes/u2/r1-x.jpg"), None);
        assert_eq!(key("https://cdn.test/recipes/u1/r2-x.jpg"), None);
        assert_eq!(key("https://cdn.test/recipes/u1/r10-x.jpg"), None);
        assert_eq!(key("https://cdn.test/recipes/u1x/r1-x.jpg"), None);
        assert_eq!(key("https://cdn.test/recipes/u1/r1-/../../u2/r1-x.jpg"), None);
    }

    #[tokio::test]
    async fn test_upload_and_remove() {
        let storage = Arc::new(MemoryStorage::default());
        let mut state = AppState::fake();
        state.storage = storage.clone();

        let url = upload_recipe_photo(&state, "u1", "r1", Bytes::from_static(b"\xff\xd8\xff"), "image/jpeg")
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.test/recipes/u1/r1-"));
        assert!(url.ends_with(".jpg"));
        assert_eq!(storage.keys().len(), 1);

        remove_photo(&state, "u1", "r1", "https://elsewhere.example/recipes/u1/r1-a.jpg").await;
        assert_eq!(storage.keys().len(), 1);

        remove_photo(&state, "u2", "r1", &url).await;
        assert_eq!(storage.keys().len(), 1);

        remove_photo(&state, "u1", "r1", &url).await;
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let state = AppState::fake();
        let err = upload_recipe_photo(&state, "u1", "r1", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported content type"));
    }
}
