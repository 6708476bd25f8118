use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // user_id
    #[serde(default, rename = "adminId", skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    pub exp: usize,
    pub jti: String,
}

impl Claims {
    /// The identity that owns reservations: the user, falling back to the admin.
    pub fn owner_id(&self) -> Option<&str> {
        let present = |id: &&str| !id.is_empty();
        self.sub
            .as_deref()
            .filter(present)
            .or_else(|| self.admin_id.as_deref().filter(present))
    }
}

fn sign(sub: Option<String>, admin_id: Option<String>, secret: &str) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| anyhow::anyhow!("token expiration overflow"))?
        .timestamp();

    let claims = Claims {
        sub,
        admin_id,
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn create_jwt(user_id: &str, secret: &str) -> Result<String> {
    sign(Some(user_id.to_owned()), None, secret)
}

pub fn create_admin_jwt(admin_id: &str, secret: &str) -> Result<String> {
    sign(None, Some(admin_id.to_owned()), secret)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let (decoding_key, validation) = if let Ok(public_key) = env::var("JWT_PUBLIC_KEY") {
        let mut val = Validation::new(Algorithm::RS256);
        val.validate_aud = false;
        (DecodingKey::from_rsa_pem(public_key.as_bytes())?, val)
    } else {
        (
            DecodingKey::from_secret(secret.as_ref()),
            Validation::default(),
        )
    };

    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_cycle() {
        let secret = "test_secret";
        let token = create_jwt("user_123", secret).unwrap();
        let claims = validate_jwt(&token, secret).unwrap();
        assert_eq!(claims.owner_id(), Some("user_123"));
    }

    #[test]
    fn test_admin_identity_is_owner_when_no_user() {
        let secret = "test_secret";
        let token = create_admin_jwt("admin_7", secret).unwrap();
        let claims = validate_jwt(&token, secret).unwrap();
        assert!(claims.sub.is_none());
        assert_eq!(claims.owner_id(), Some("admin_7"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_jwt("user_123", "one").unwrap();
        assert!(validate_jwt(&token, "two").is_err());
    }

    #[test]
    fn test_empty_identity_is_not_an_owner() {
        let claims = Claims {
            sub: Some(String::new()),
            admin_id: None,
            exp: 0,
            jti: "x".into(),
        };
        assert_eq!(claims.owner_id(), None);
    }
}
