use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use std::sync::Arc;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::AuthenticatedUser;
use crate::services::{JwtService, UserDirectory};

/// Who, if anyone, is signed in for this request.
///
/// Never fails: a missing or invalid token, or one whose account has since
/// been deactivated or removed, simply yields `user: None`.
pub struct AuthContext {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthContext {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let claimed = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| JwtService::verify_token(token.trim()).ok())
            .and_then(|claims| claims.into_user());

        let user = match (claimed, req.rocket().state::<Arc<UserDirectory>>()) {
            (Some(user), Some(users)) if users.is_active(user.id).await => Some(user),
            _ => None,
        };

        Outcome::Success(AuthContext { user })
    }
}

/// JWT-based authentication guard
pub struct AuthGuard {
    pub user: AuthenticatedUser,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<AuthContext>().await {
            Outcome::Success(AuthContext { user: Some(user) }) => Outcome::Success(AuthGuard { user }),
            Outcome::Success(AuthContext { user: None }) => Outcome::Error((Status::Unauthorized, ())),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthContext {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
