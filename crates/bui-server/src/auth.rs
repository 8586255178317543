//! Caller authentication
//!
//! Users are declared in the configuration with the SHA-256 digest of their
//! API token. The authenticated username is what the ACL and the response
//! cache key on.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::config::AuthConfig;
use crate::protocol::ApiError;

/// Identity used when authentication is disabled
pub const ANONYMOUS: &str = "anonymous";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }
}

/// Hex SHA-256 digest of a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Authentication manager
pub struct AuthManager {
    enabled: bool,
    /// Index: token digest -> username
    tokens: HashMap<String, String>,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Self {
        let tokens = config
            .users
            .iter()
            .map(|u| (u.token_sha256.to_lowercase(), u.username.clone()))
            .collect();
        Self {
            enabled: config.enabled,
            tokens,
        }
    }

    /// Manager accepting every caller as `anonymous`
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tokens: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn user_count(&self) -> usize {
        self.tokens.len()
    }

    /// Authenticate with a raw API token
    pub fn authenticate_token(&self, token: &str) -> Result<Identity, ApiError> {
        self.tokens
            .get(&hash_token(token))
            .map(|username| Identity::new(username))
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))
    }

    /// Authenticate from the Authorization header
    pub fn authenticate_header(&self, auth_header: &str) -> Result<Identity, ApiError> {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return self.authenticate_token(token.trim());
        }

        // BUIToken=<user>:<token>
        if let Some(rest) = auth_header.strip_prefix("BUIToken=") {
            if let Some((user, token)) = rest.split_once(':') {
                let identity = self.authenticate_token(token.trim())?;
                if identity.username != user {
                    return Err(ApiError::unauthorized("Token does not belong to user"));
                }
                return Ok(identity);
            }
        }

        Err(ApiError::unauthorized("Invalid authorization header"))
    }

    /// Resolve the caller from request headers
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        cookie: Option<&str>,
    ) -> Result<Identity, ApiError> {
        if !self.enabled {
            return Ok(Identity::anonymous());
        }
        if let Some(header) = authorization {
            return self.authenticate_header(header);
        }
        if let Some(token) = cookie.and_then(extract_token_cookie) {
            return self.authenticate_token(token);
        }
        Err(ApiError::unauthorized("No authentication provided"))
    }
}

/// Extract the API token from the `bui_token` cookie
fn extract_token_cookie(cookie: &str) -> Option<&str> {
    cookie
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("bui_token="))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserConfig;

    fn manager() -> AuthManager {
        AuthManager::new(&AuthConfig {
            enabled: true,
            users: vec![
                UserConfig {
                    username: "admin".to_string(),
                    token_sha256: hash_token("admin-secret"),
                },
                UserConfig {
                    username: "bob".to_string(),
                    token_sha256: hash_token("bob-secret").to_uppercase(),
                },
            ],
        })
    }

    #[test]
    fn test_disabled_is_anonymous() {
        let auth = AuthManager::disabled();
        let identity = auth.authenticate(None, None).unwrap();
        assert_eq!(identity.username, ANONYMOUS);
    }

    #[test]
    fn test_bearer_token() {
        let auth = manager();
        assert_eq!(auth.user_count(), 2);
        let identity = auth.authenticate(Some("Bearer admin-secret"), None).unwrap();
        assert_eq!(identity.username, "admin");

        // digests are matched case-insensitively
        let identity = auth.authenticate(Some("Bearer bob-secret"), None).unwrap();
        assert_eq!(identity.username, "bob");
    }

    #[test]
    fn test_user_token_header() {
        let auth = manager();
        assert!(auth.authenticate_header("BUIToken=bob:bob-secret").is_ok());
        let err = auth.authenticate_header("BUIToken=admin:bob-secret").unwrap_err();
        assert_eq!(err.status, 401);
    }

    #[test]
    fn test_cookie_token() {
        let auth = manager();
        let identity = auth
            .authenticate(None, Some("theme=dark; bui_token=bob-secret"))
            .unwrap();
        assert_eq!(identity.username, "bob");
    }

    #[test]
    fn test_rejections() {
        let auth = manager();
        assert_eq!(auth.authenticate(None, None).unwrap_err().status, 401);
        assert!(auth.authenticate(Some("Bearer nope"), None).is_err());
        assert!(auth.authenticate(Some("Basic abc"), None).is_err());
    }
}
