use crate::{
    model::{
        Id,
        account::{AccountMarker, HashedPassword},
    },
    util::PositiveDuration,
};
use argon2::{
    Argon2, PasswordHash,
    password_hash::{self, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::UtcDateTime;

pub const PASSWORD_SALT_LEN: usize = 16;
pub const SESSION_LIFETIME: PositiveDuration = PositiveDuration::WEEK;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

/// Hashes `password` with Argon2id and a fresh random salt.
///
/// This is slow on purpose; async callers should run it on a blocking thread.
pub fn hash_password(password: &str) -> Result<HashedPassword, PasswordHashError> {
    let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordHashError)?;

    Ok(HashedPassword::from_phc(hash.to_string()))
}

/// Checks `password` against a stored hash in constant time.
///
/// A mismatch is `Ok(false)`; `Err` means the stored hash itself is unusable.
pub fn verify_password(password: &str, hash: &HashedPassword) -> Result<bool, PasswordHashError> {
    let parsed = PasswordHash::new(hash.as_phc()).map_err(PasswordHashError)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordHashError(err)),
    }
}

/// Claims carried by a session token.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct SessionClaims {
    pub sub: Id<AccountMarker>,
    pub iat: i64,
    pub exp: i64,
}

/// A signed session token as handed to clients.
#[derive(Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"[redacted]").finish()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session token could not be signed: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("Session token is invalid: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("Session token has expired")]
    Expired,
}

/// Mints and checks HS256 session tokens.
///
/// Verification is stateless: a token stays valid until its `exp`, there is no
/// revocation list.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: PositiveDuration,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetime(secret, SESSION_LIFETIME)
    }

    #[must_use]
    pub fn with_lifetime(secret: &[u8], lifetime: PositiveDuration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `verify_at` against an explicit clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    #[must_use]
    pub fn lifetime(&self) -> PositiveDuration {
        self.lifetime
    }

    pub fn issue(&self, account: Id<AccountMarker>) -> Result<SessionToken, SessionError> {
        self.issue_at(account, UtcDateTime::now())
    }

    pub fn issue_at(
        &self,
        account: Id<AccountMarker>,
        now: UtcDateTime,
    ) -> Result<SessionToken, SessionError> {
        let claims = SessionClaims {
            sub: account,
            iat: now.unix_timestamp(),
            exp: (now + self.lifetime.get()).unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map(SessionToken)
            .map_err(SessionError::Sign)
    }

    pub fn verify(&self, token: &str) -> Result<Id<AccountMarker>, SessionError> {
        self.verify_at(token, UtcDateTime::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: UtcDateTime,
    ) -> Result<Id<AccountMarker>, SessionError> {
        let claims =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
                .map_err(SessionError::Invalid)?
                .claims;

        if claims.exp <= now.unix_timestamp() {
            return Err(SessionError::Expired);
        }

        Ok(claims.sub)
    }
}

impl Debug for SessionIssuer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("key", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            account::{AccountMarker, HashedPassword},
            auth::{SESSION_LIFETIME, SessionError, SessionIssuer, hash_password, verify_password},
        },
        util::PositiveDuration,
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("pw123456").unwrap();

        assert!(hash.as_phc().starts_with("$argon2id$"));
        assert!(!hash.as_phc().contains("pw123456"));
        assert!(verify_password("pw123456", &hash).unwrap());
        assert!(!verify_password("pw1234567", &hash).unwrap());
    }

    #[test]
    fn same_password_different_salts() {
        let first = hash_password("pw123456").unwrap();
        let second = hash_password("pw123456").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn unusable_stored_hash_is_an_error() {
        let garbage = HashedPassword::from_phc("not a phc string".to_owned());
        assert!(verify_password("pw123456", &garbage).is_err());
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = SessionIssuer::new(b"secret");
        let account = Id::<AccountMarker>::generate();
        let now = utc_datetime!(2025-10-24 10:00);

        let token = issuer.issue_at(account, now).unwrap();

        assert_eq!(issuer.verify_at(token.as_str(), now).unwrap(), account);
        assert_eq!(
            issuer
                .verify_at(token.as_str(), now + SESSION_LIFETIME.get() - Duration::SECOND)
                .unwrap(),
            account
        );
    }

    #[test]
    fn token_expires_after_seven_days() {
        let issuer = SessionIssuer::new(b"secret");
        let now = utc_datetime!(2025-10-24 10:00);
        let token = issuer.issue_at(Id::generate(), now).unwrap();

        assert!(matches!(
            issuer.verify_at(token.as_str(), now + Duration::days(7)),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn custom_lifetime() {
        let issuer =
            SessionIssuer::with_lifetime(b"secret", PositiveDuration::days(1).unwrap());
        let now = utc_datetime!(2025-10-24 10:00);
        let token = issuer.issue_at(Id::generate(), now).unwrap();

        assert!(issuer.verify_at(token.as_str(), now + Duration::hours(23)).is_ok());
        assert!(issuer.verify_at(token.as_str(), now + Duration::hours(25)).is_err());
    }

    #[test]
    fn foreign_and_malformed_tokens_are_rejected() {
        let issuer = SessionIssuer::new(b"secret");
        let forger = SessionIssuer::new(b"other secret");
        let now = utc_datetime!(2025-10-24 10:00);

        let forged = forger.issue_at(Id::generate(), now).unwrap();
        assert!(matches!(
            issuer.verify_at(forged.as_str(), now),
            Err(SessionError::Invalid(_))
        ));

        for malformed in ["", "abc", "a.b.c"] {
            assert!(matches!(
                issuer.verify_at(malformed, now),
                Err(SessionError::Invalid(_))
            ));
        }
    }

    #[test]
    fn token_debug_is_redacted() {
        let issuer = SessionIssuer::new(b"secret");
        let token = issuer.issue(Id::generate()).unwrap();

        assert!(!format!("{token:?}").contains(token.as_str()));
        assert!(!format!("{issuer:?}").contains("secret"));
    }
}
