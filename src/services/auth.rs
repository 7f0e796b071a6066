//! Email/password and anonymous sign-in.
//!
//! Passwords are stored as argon2id PHC strings, which carry their own salt
//! and parameters. Signup validation mirrors the mobile form: every field present,
//! passwords match, email shaped like `x@y.z`, terms accepted.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SALT_LEN: usize = 16;
const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Student,
    Teacher,
}

impl AccountType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown account type: {0}")]
pub struct UnknownAccountType(String);

impl std::str::FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            _ => Err(UnknownAccountType(raw.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("All fields are required!")]
    MissingFields,
    #[error("Passwords do not match!")]
    PasswordMismatch,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("You must agree to the terms and conditions.")]
    TermsNotAccepted,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFields | Self::PasswordMismatch | Self::InvalidEmail | Self::TermsNotAccepted => {
                "E_VALIDATION"
            }
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Hash(_) => "E_PASSWORD_HASH",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

/// Signup form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub account_type: AccountType,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// Signup input after validation and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub account_type: AccountType,
    pub password: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Lowercased, trimmed email if it looks like `local@domain.tld`.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = normalized.rsplit_once('@')?;
    let (host, tld) = domain.rsplit_once('.')?;
    if local.is_empty() || host.is_empty() || tld.is_empty() {
        return None;
    }
    Some(normalized)
}

/// Check a signup form in the order the form reports problems.
///
/// # Errors
///
/// Returns the first failing rule.
pub fn validate_signup(req: &SignupRequest) -> Result<NewAccount, AuthError> {
    let full_name = req.full_name.trim();
    let phone_number = req.phone_number.trim();
    if full_name.is_empty()
        || req.email.trim().is_empty()
        || phone_number.is_empty()
        || req.password.is_empty()
        || req.confirm_password.is_empty()
    {
        return Err(AuthError::MissingFields);
    }
    if req.password != req.confirm_password {
        return Err(AuthError::PasswordMismatch);
    }
    let email = normalize_email(&req.email).ok_or(AuthError::InvalidEmail)?;
    if !req.terms_accepted {
        return Err(AuthError::TermsNotAccepted);
    }
    Ok(NewAccount {
        full_name: full_name.to_owned(),
        email,
        phone_number: phone_number.to_owned(),
        account_type: req.account_type,
        password: req.password.clone(),
    })
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Argon2id PHC string for `password`, with a fresh random salt.
///
/// # Errors
///
/// `Hash` if argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; SALT_LEN] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::Hash)?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(AuthError::Hash)?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a stored value that is not a PHC string.
#[must_use]
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc).is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Create an account. Returns the new user id.
///
/// # Errors
///
/// `EmailTaken` if the email is registered, `Db` otherwise.
pub async fn sign_up(pool: &PgPool, account: &NewAccount) -> Result<Uuid, AuthError> {
    let id = Uuid::new_v4();
    let hash = hash_password(&account.password)?;

    let result = sqlx::query(
        r"INSERT INTO users (id, full_name, email, phone_number, account_type, password_hash)
          VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(&account.full_name)
    .bind(&account.email)
    .bind(&account.phone_number)
    .bind(account.account_type.as_str())
    .bind(hash)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(id),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AuthError::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

/// Check credentials. Returns the user id.
///
/// # Errors
///
/// `InvalidCredentials` for unknown emails, anonymous accounts and wrong
/// passwords alike.
pub async fn log_in(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AuthError> {
    let normalized = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
        .bind(&normalized)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let hash: Option<String> = row.get("password_hash");
    let Some(hash) = hash else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &hash) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(row.get("id"))
}

/// Create an anonymous student account.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn sign_in_anonymously(pool: &PgPool) -> Result<Uuid, AuthError> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, full_name, is_anonymous) VALUES ($1, $2, TRUE)")
        .bind(id)
        .bind(ANONYMOUS_NAME)
        .execute(pool)
        .await?;
    Ok(id)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
