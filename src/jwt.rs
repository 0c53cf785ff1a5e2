//! JWT verification against the access and refresh signing keys.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::ErrorKind;

/// Minimum decoded key length for HMAC-SHA signing keys (256 bits).
pub const MIN_KEY_LENGTH: usize = 32;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on every routed request
    Access,
    /// Long-lived token, only valid against the refresh key
    Refresh,
}

impl TokenType {
    /// Cookie name carrying this token type.
    pub const fn cookie_name(self) -> &'static str {
        match self {
            TokenType::Access => "access_token",
            TokenType::Refresh => "refresh_token",
        }
    }
}

/// Claims of a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller identity forwarded to downstream services
    #[serde(rename = "memberId")]
    pub member_id: i64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Errors raised while decoding the configured secrets at startup.
#[derive(Debug)]
pub enum KeyConfigError {
    /// Secret is not valid base64
    InvalidBase64(TokenType, base64::DecodeError),
    /// Decoded key is shorter than [`MIN_KEY_LENGTH`]
    WeakKey(TokenType, usize),
    /// Access and refresh secrets decode to the same key
    SharedKey,
}

impl std::fmt::Display for KeyConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyConfigError::InvalidBase64(ty, e) => {
                write!(f, "{} secret is not valid base64: {}", ty.cookie_name(), e)
            }
            KeyConfigError::WeakKey(ty, len) => write!(
                f,
                "{} secret decodes to {} bytes, at least {} are required",
                ty.cookie_name(),
                len,
                MIN_KEY_LENGTH
            ),
            KeyConfigError::SharedKey => {
                write!(f, "access and refresh secrets must be different")
            }
        }
    }
}

impl std::error::Error for KeyConfigError {}

/// One decoded HMAC key together with the algorithms its length supports.
#[derive(Clone)]
struct SigningKey {
    decoding: DecodingKey,
    algorithms: Vec<Algorithm>,
}

impl SigningKey {
    fn new(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            algorithms: hmac_algorithms(secret.len()),
        }
    }
}

/// HMAC algorithms whose minimum key size is met by a key of `key_len` bytes.
fn hmac_algorithms(key_len: usize) -> Vec<Algorithm> {
    [
        (Algorithm::HS256, 32),
        (Algorithm::HS384, 48),
        (Algorithm::HS512, 64),
    ]
    .into_iter()
    .filter(|(_, min_len)| key_len >= *min_len)
    .map(|(algorithm, _)| algorithm)
    .collect()
}

/// Decoded key material, one key per token type. Built once at startup.
#[derive(Clone)]
pub struct SigningKeys {
    access: SigningKey,
    refresh: SigningKey,
}

impl SigningKeys {
    /// Decode both base64 secrets.
    pub fn from_base64(access_secret: &str, refresh_secret: &str) -> Result<Self, KeyConfigError> {
        let access = STANDARD
            .decode(access_secret.trim())
            .map_err(|e| KeyConfigError::InvalidBase64(TokenType::Access, e))?;
        let refresh = STANDARD
            .decode(refresh_secret.trim())
            .map_err(|e| KeyConfigError::InvalidBase64(TokenType::Refresh, e))?;
        Self::from_bytes(&access, &refresh)
    }

    /// Build keys from raw secret bytes.
    pub fn from_bytes(access: &[u8], refresh: &[u8]) -> Result<Self, KeyConfigError> {
        if access.len() < MIN_KEY_LENGTH {
            return Err(KeyConfigError::WeakKey(TokenType::Access, access.len()));
        }
        if refresh.len() < MIN_KEY_LENGTH {
            return Err(KeyConfigError::WeakKey(TokenType::Refresh, refresh.len()));
        }
        if access == refresh {
            return Err(KeyConfigError::SharedKey);
        }

        Ok(Self {
            access: SigningKey::new(access),
            refresh: SigningKey::new(refresh),
        })
    }

    fn key(&self, token_type: TokenType) -> &SigningKey {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }
}

/// Verifies signed tokens and extracts their claims.
#[derive(Clone)]
pub struct TokenCodec {
    keys: SigningKeys,
    access_validation: Validation,
    refresh_validation: Validation,
}

impl TokenCodec {
    pub fn new(keys: SigningKeys) -> Self {
        let access_validation = validation_for(&keys.access);
        let refresh_validation = validation_for(&keys.refresh);

        Self {
            keys,
            access_validation,
            refresh_validation,
        }
    }

    fn validation(&self, token_type: TokenType) -> &Validation {
        match token_type {
            TokenType::Access => &self.access_validation,
            TokenType::Refresh => &self.refresh_validation,
        }
    }

    /// Verify a token of the given type against the current time.
    pub fn verify(&self, token: &str, token_type: TokenType) -> Result<Claims, ErrorKind> {
        let claims = self.verify_signature(token, token_type)?;
        let now = unix_now().ok_or(ErrorKind::TokenAuthorizationFail)?;
        check_expiry(claims, now)
    }

    /// Verify a token of the given type against an explicit Unix timestamp.
    pub fn verify_at(
        &self,
        token: &str,
        token_type: TokenType,
        now: u64,
    ) -> Result<Claims, ErrorKind> {
        let claims = self.verify_signature(token, token_type)?;
        check_expiry(claims, now)
    }

    /// Whether a correctly signed token has expired.
    ///
    /// A token that fails the signature check is an error, not "expired".
    pub fn is_expired(&self, token: &str, token_type: TokenType) -> Result<bool, ErrorKind> {
        match self.verify(token, token_type) {
            Ok(_) => Ok(false),
            Err(ErrorKind::TokenExpired) => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn verify_signature(&self, token: &str, token_type: TokenType) -> Result<Claims, ErrorKind> {
        if token.is_empty() {
            return Err(ErrorKind::TokenAuthorizationFail);
        }

        let key = &self.keys.key(token_type).decoding;
        jsonwebtoken::decode::<Claims>(token, key, self.validation(token_type))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(token_type = ?token_type, error = %e, "Token rejected");
                ErrorKind::TokenAuthorizationFail
            })
    }
}

fn validation_for(key: &SigningKey) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = key.algorithms.clone();
    validation.leeway = 0;
    // Expiry is checked separately, after the signature.
    validation.validate_exp = false;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);
    validation
}

fn check_expiry(claims: Claims, now: u64) -> Result<Claims, ErrorKind> {
    if claims.exp <= now {
        return Err(ErrorKind::TokenExpired);
    }
    Ok(claims)
}

fn unix_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}
