use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use ntc_core::{Requester, Role};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

/// Tokens are issued by the user service; `role` is one of
/// `commuter`, `operator`, `admin`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn into_requester(self) -> Result<Requester, AppError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AppError::AuthenticationError(format!("Unknown role: {}", self.role)))?;
        Ok(Requester::new(self.sub, role))
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Resolves the bearer token into a `Requester` extension for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthenticationError("Expected a bearer token".into()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid or expired token".into())
    })?;

    let requester = token_data.claims.into_requester()?;
    req.extensions_mut().insert(requester);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(secret: &str, user_id: &str, role: Role) -> String {
        let claims = Claims {
            sub: user_id.to_owned(),
            role: role.as_str().to_owned(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_signed_token_decodes_to_requester() {
        let token = sign("secret", "alice", Role::Operator);
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();

        let requester = data.claims.into_requester().unwrap();
        assert_eq!(requester.user_id, "alice");
        assert_eq!(requester.role, Role::Operator);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let claims = Claims {
            sub: "mallory".into(),
            role: "superuser".into(),
            exp: 0,
        };
        assert!(matches!(claims.into_requester(), Err(AppError::AuthenticationError(_))));
    }
}
