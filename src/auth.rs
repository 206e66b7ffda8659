//! Caller identity as delivered by the upstream gateway.
//!
//! The gateway authenticates the request and forwards `X-User-Id` and
//! `X-User-Role`; this service trusts both without re-verifying.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::error::ServiceError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    RestaurantManager,
    Admin,
    /// In-process callers only; never accepted from a request.
    System,
}

impl Role {
    fn from_header(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Role::Customer),
            "restaurant_manager" => Some(Role::RestaurantManager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: Role,
}

impl Actor {
    pub fn system() -> Self {
        Actor { user_id: 0, role: Role::System }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::System)
    }

    /// Whether this actor may act on behalf of the restaurant managed by `manager_id`.
    pub fn manages(&self, manager_id: i32) -> bool {
        self.is_admin() || (self.role == Role::RestaurantManager && self.user_id == manager_id)
    }

    pub fn require_manager_role(&self) -> Result<(), ServiceError> {
        match self.role {
            Role::RestaurantManager | Role::Admin | Role::System => Ok(()),
            Role::Customer => Err(ServiceError::forbidden("restaurant manager role required")),
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("admin role required"))
        }
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn actor_from_request(req: &HttpRequest) -> Result<Actor, ServiceError> {
    let user_id = header(req, USER_ID_HEADER)
        .ok_or_else(|| ServiceError::Unauthorized("missing caller identity".to_owned()))?
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ServiceError::Unauthorized("malformed caller identity".to_owned()))?;

    let role = header(req, USER_ROLE_HEADER)
        .and_then(Role::from_header)
        .ok_or_else(|| ServiceError::Unauthorized("missing or unknown caller role".to_owned()))?;

    Ok(Actor { user_id, role })
}

impl FromRequest for Actor {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(actor_from_request(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_identity_from_headers() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "42"))
            .insert_header((USER_ROLE_HEADER, "restaurant_manager"))
            .to_http_request();

        let actor = Actor::extract(&req).await.unwrap();
        assert_eq!(actor, Actor { user_id: 42, role: Role::RestaurantManager });
    }

    #[actix_web::test]
    async fn rejects_missing_identity() {
        let req = TestRequest::default().to_http_request();
        let err = Actor::extract(&req).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn system_role_cannot_be_claimed_by_a_request() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "1"))
            .insert_header((USER_ROLE_HEADER, "system"))
            .to_http_request();
        assert!(Actor::extract(&req).await.is_err());
    }

    #[actix_web::test]
    async fn rejects_non_positive_ids() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "-3"))
            .insert_header((USER_ROLE_HEADER, "customer"))
            .to_http_request();
        assert!(Actor::extract(&req).await.is_err());
    }

    #[test]
    fn managers_only_manage_their_own_restaurants() {
        let manager = Actor { user_id: 7, role: Role::RestaurantManager };
        assert!(manager.manages(7));
        assert!(!manager.manages(8));

        let customer = Actor { user_id: 7, role: Role::Customer };
        assert!(!customer.manages(7));

        let admin = Actor { user_id: 1, role: Role::Admin };
        assert!(admin.manages(7));
        assert!(Actor::system().manages(7));
    }
}
