//! Extract the current user placed on the request by an outer auth layer.

use crate::view::CurrentUser;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Anonymous when no layer inserted a [`CurrentUser`] extension.
#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn missing_extension_is_anonymous() {
        let (mut parts, _) = Request::new(()).into_parts();
        let user = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!user.is_authenticated);
    }

    #[tokio::test]
    async fn extension_is_used_when_present() {
        let mut req = Request::new(());
        req.extensions_mut().insert(CurrentUser::authenticated("ada").with_permission("notes.edit"));
        let (mut parts, _) = req.into_parts();
        let user = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id.as_deref(), Some("ada"));
        assert!(user.has_perm("notes.edit"));
    }
}
