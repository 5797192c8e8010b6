use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A registered account. `password` holds the argon2-encoded hash, never the
/// plaintext; `access_token` is generated once at signup and never rotated.
/// Handlers shape their own response JSON, so neither field leaks through a
/// direct serialization of this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub phone_number: String,
    pub access_token: String,
    pub orders: Vec<String>,
    pub favourites: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Profile edit. The password is optional: the hash step runs only when a new
/// one is supplied, so unrelated edits never re-hash the stored secret.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    pub name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub phone_number: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub price: f64,
    pub dimensions: String,
    pub category: String,
    pub image_url: String,
    pub designer: ObjectId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Designer {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ObjectId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<LineItem>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderInput {
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub product_id: String,
    pub quantity: u32,
}

/// Saved favourite. Writes are not exposed yet; only the per-user listing is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favourite {
    pub id: String,
    pub user_id: String,
    pub product_id: ObjectId,
    pub image_url: String,
}
