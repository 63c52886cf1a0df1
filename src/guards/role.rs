use rocket::request::{self, Request, FromRequest, Outcome};
use rocket::http::Status;
use rocket_okapi::request::OpenApiFromRequest;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::RequestHeaderInput;
use log::warn;

use crate::guards::AuthGuard;
use crate::models::{AuthenticatedUser, Role};

async fn require_role<'r>(req: &'r Request<'_>, role: Role) -> Outcome<AuthenticatedUser, ()> {
    match req.guard::<AuthGuard>().await {
        Outcome::Success(auth) if auth.user.role == role => Outcome::Success(auth.user),
        Outcome::Success(auth) => {
            warn!(
                "Role guard rejected {} - has {:?}, needs {:?}",
                auth.user.email, auth.user.role, role
            );
            Outcome::Error((Status::Forbidden, ()))
        }
        Outcome::Error(e) => Outcome::Error(e),
        Outcome::Forward(f) => Outcome::Forward(f),
    }
}

/// Platform administrator.
pub struct AdminGuard {
    pub user: AuthenticatedUser,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        require_role(req, Role::Admin).await.map(|user| AdminGuard { user })
    }
}

/// Marketplace lessor managing their own equipment.
pub struct LessorGuard {
    pub user: AuthenticatedUser,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for LessorGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        require_role(req, Role::Lessor).await.map(|user| LessorGuard { user })
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for LessorGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
