use std::time::Duration;

use argon2::{self, Config as ArgonConfig};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mongodb::bson::{doc, Document};
use mongodb::Collection;
use rand::{Rng, RngCore};
use uuid::Uuid;

use crate::db;
use crate::errors::ApiError;
use crate::models::{SignUpInput, UpdateProfileInput, User};

const MIN_NAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 4;
const MAX_PASSWORD_LEN: usize = 12;
const TOKEN_BYTES: usize = 48;

/// Persists accounts and resolves credentials. Writes follow an explicit
/// validate, conditionally hash, persist pipeline; nothing happens in
/// lifecycle hooks.
#[derive(Clone)]
pub struct UserStore {
    col: Collection<User>,
    timeout: Duration,
}

impl UserStore {
    pub fn new(col: Collection<User>, timeout: Duration) -> Self {
        UserStore { col, timeout }
    }

    pub async fn create(&self, input: &SignUpInput) -> Result<User, ApiError> {
        validate_sign_up(input)?;
        if self.find_by_email(&input.email).await?.is_some() {
            return Err(ApiError::Conflict(format!(
                "email '{}' is already registered",
                input.email
            )));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            email: input.email.clone(),
            password: hash_secret(&input.password)?,
            street: input.street.clone(),
            postal_code: input.postal_code.clone(),
            city: input.city.clone(),
            phone_number: input.phone_number.clone(),
            access_token: generate_token(),
            orders: Vec::new(),
            favourites: Vec::new(),
        };

        match tokio::time::timeout(self.timeout, self.col.insert_one(&user, None)).await {
            Ok(Ok(_)) => Ok(user),
            // the unique index can still race the pre-check above
            Ok(Err(e)) if db::is_duplicate_key(&e) => Err(ApiError::Conflict(
                "email or access token is already registered".to_string(),
            )),
            Ok(Err(e)) => Err(ApiError::Persistence(e.to_string())),
            Err(_) => Err(ApiError::Persistence("user insert timed out".to_string())),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let filter = doc! { "email": email };
        db::with_timeout(self.timeout, self.col.find_one(filter, None)).await
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<User>, ApiError> {
        let filter = doc! { "access_token": token };
        db::with_timeout(self.timeout, self.col.find_one(filter, None)).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, ApiError> {
        let filter = doc! { "id": id };
        db::with_timeout(self.timeout, self.col.find_one(filter, None)).await
    }

    /// The token and email are immutable; the hash step runs only when the
    /// input carries a new password.
    pub async fn update_profile(
        &self,
        id: &str,
        input: &UpdateProfileInput,
    ) -> Result<(), ApiError> {
        validate_profile(input)?;
        let mut set = doc! {
            "name": &input.name,
            "street": &input.street,
            "postal_code": &input.postal_code,
            "city": &input.city,
            "phone_number": &input.phone_number,
        };
        if let Some(password) = &input.password {
            validate_password(password)?;
            set.insert("password", hash_secret(password)?);
        }
        let update = update_document(set);
        let result = db::with_timeout(
            self.timeout,
            self.col.update_one(doc! { "id": id }, update, None),
        )
        .await?;
        if result.matched_count == 0 {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    }

    /// Link step of order placement: `$addToSet` keeps retries idempotent.
    pub async fn push_order(&self, user_id: &str, order_id: &str) -> Result<(), ApiError> {
        let update = doc! { "$addToSet": { "orders": order_id } };
        let result = db::with_timeout(
            self.timeout,
            self.col.update_one(doc! { "id": user_id }, update, None),
        )
        .await?;
        if result.matched_count == 0 {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    }
}

impl crate::middleware::TokenLookup for UserStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<User>, ApiError> {
        UserStore::find_by_token(self, token).await
    }
}

fn update_document(set: Document) -> Document {
    doc! { "$set": set }
}

pub fn hash_secret(plain: &str) -> Result<String, ApiError> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    argon2::hash_encoded(plain.as_bytes(), &salt, &ArgonConfig::default())
        .map_err(|e| ApiError::Persistence(format!("password hashing failed: {}", e)))
}

/// Encoded-verify compares in constant time; any malformed stored hash reads
/// as a mismatch.
pub fn verify_secret(plain: &str, stored: &str) -> bool {
    argon2::verify_encoded(stored, plain.as_bytes()).unwrap_or(false)
}

pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

fn validate_sign_up(input: &SignUpInput) -> Result<(), ApiError> {
    if input.name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ApiError::Validation("name is too short".to_string()));
    }
    if input.email.trim().is_empty() {
        return Err(ApiError::Validation("email is required".to_string()));
    }
    validate_password(&input.password)?;
    require_field(&input.street, "street")?;
    require_field(&input.postal_code, "postalCode")?;
    require_field(&input.city, "city")?;
    require_field(&input.phone_number, "phoneNumber")
}

fn validate_profile(input: &UpdateProfileInput) -> Result<(), ApiError> {
    if input.name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ApiError::Validation("name is too short".to_string()));
    }
    require_field(&input.street, "street")?;
    require_field(&input.postal_code, "postalCode")?;
    require_field(&input.city, "city")?;
    require_field(&input.phone_number, "phoneNumber")
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ApiError::Validation(format!(
            "password must be {}-{} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn require_field(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up_input() -> SignUpInput {
        SignUpInput {
            name: "Karin Larsson".to_string(),
            email: "karin@example.com".to_string(),
            password: "hunter2".to_string(),
            street: "Storgatan 1".to_string(),
            postal_code: "11122".to_string(),
            city: "Stockholm".to_string(),
            phone_number: "+46701234567".to_string(),
        }
    }

    #[test]
    fn sign_up_rejects_short_name() {
        let mut input = sign_up_input();
        input.name = "K".to_string();
        assert!(matches!(
            validate_sign_up(&input),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn sign_up_rejects_out_of_bounds_password() {
        let mut input = sign_up_input();
        input.password = "abc".to_string();
        assert!(validate_sign_up(&input).is_err());
        input.password = "a".repeat(13);
        assert!(validate_sign_up(&input).is_err());
        input.password = "abcd".to_string();
        assert!(validate_sign_up(&input).is_ok());
    }

    #[test]
    fn sign_up_rejects_blank_contact_fields() {
        let mut input = sign_up_input();
        input.street = "  ".to_string();
        assert!(matches!(
            validate_sign_up(&input),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn stored_secret_is_never_the_plaintext_and_verifies() {
        let hash = hash_secret("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_secret("hunter2", &hash));
        assert!(!verify_secret("hunter3", &hash));
    }

    #[test]
    fn hashing_salts_per_call() {
        let first = hash_secret("hunter2").unwrap();
        let second = hash_secret("hunter2").unwrap();
        assert_ne!(first, second);
        assert!(verify_secret("hunter2", &first));
        assert!(verify_secret("hunter2", &second));
    }

    #[test]
    fn verify_tolerates_garbage_hashes() {
        assert!(!verify_secret("hunter2", "not-an-argon2-hash"));
    }

    #[test]
    fn tokens_are_opaque_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 48 bytes, unpadded url-safe base64
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn profile_update_only_sets_password_when_supplied() {
        let set = doc! { "name": "Karin" };
        let update = update_document(set);
        let set = update.get_document("$set").unwrap();
        assert!(!set.contains_key("password"));
    }
}
