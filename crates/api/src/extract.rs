//! Caller identity supplied by the session layer in front of this service.

use std::collections::BTreeSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use fulfillment::{Actor, Permission, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Comma-separated permission names, e.g. `cancel_any_order,update_order_status`.
pub const USER_PERMISSIONS_HEADER: &str = "x-user-permissions";

/// The authenticated [`Actor`] behind a request.
///
/// Headers are trusted as already verified upstream.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?
            .trim()
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER}: {e}")))?;

        let role = match header(parts, USER_ROLE_HEADER)? {
            Some(raw) => raw.parse::<Role>().map_err(ApiError::BadRequest)?,
            None => Role::Customer,
        };

        let permissions = match header(parts, USER_PERMISSIONS_HEADER)? {
            Some(raw) => parse_permissions(raw)?,
            None => BTreeSet::new(),
        };

        Ok(RequestActor(Actor {
            user_id,
            role,
            permissions,
        }))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))
        })
        .transpose()
}

fn parse_permissions(raw: &str) -> Result<BTreeSet<Permission>, ApiError> {
    raw.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.parse::<Permission>().map_err(ApiError::BadRequest))
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<Actor, ApiError> {
        let (mut parts, ()) = request.into_parts();
        RequestActor::from_request_parts(&mut parts, &())
            .await
            .map(|RequestActor(actor)| actor)
    }

    #[tokio::test]
    async fn test_customer_by_default() {
        let user = UserId::new();
        let request = Request::builder()
            .header(USER_ID_HEADER, user.to_string())
            .body(())
            .unwrap();

        let actor = extract(request).await.unwrap();
        assert_eq!(actor, Actor::customer(user));
    }

    #[tokio::test]
    async fn test_staff_with_permissions() {
        let request = Request::builder()
            .header(USER_ID_HEADER, UserId::new().to_string())
            .header(USER_ROLE_HEADER, "Staff")
            .header(USER_PERMISSIONS_HEADER, "cancel_any_order, update_order_status")
            .body(())
            .unwrap();

        let actor = extract(request).await.unwrap();
        assert_eq!(actor.role, Role::Staff);
        assert!(actor.has_permission(Permission::CancelAnyOrder));
        assert!(actor.has_permission(Permission::UpdateOrderStatus));
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_permission_is_rejected() {
        let request = Request::builder()
            .header(USER_ID_HEADER, UserId::new().to_string())
            .header(USER_PERMISSIONS_HEADER, "launch_missiles")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
