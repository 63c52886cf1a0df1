use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuthenticatedUser, Role};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Account ID
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn into_user(self) -> Option<AuthenticatedUser> {
        let id = Uuid::parse_str(&self.sub).ok()?;
        Some(AuthenticatedUser {
            id,
            email: self.email,
            role: self.role,
        })
    }
}

pub struct JwtService;

impl JwtService {
    pub fn generate_access_token(user: &AuthenticatedUser) -> Result<String, jsonwebtoken::errors::Error> {
        let expiry = crate::config::Config::jwt_expiry();
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: now + expiry,
            iat: now,
        };

        let secret = crate::config::Config::jwt_secret();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = crate::config::Config::jwt_secret();

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_the_principal() {
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: "admin@farmrent.co.th".to_string(),
            role: Role::Admin,
        };
        let token = JwtService::generate_access_token(&user).unwrap();
        let claims = JwtService::verify_token(&token).unwrap();
        assert_eq!(claims.into_user(), Some(user));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(JwtService::verify_token("not.a.token").is_err());
    }
}
