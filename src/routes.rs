use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::doc;
use mongodb::Collection;
use serde_json::{json, Value};

use crate::catalog::{self, CatalogStore, MongoCatalog};
use crate::config::Config;
use crate::db;
use crate::errors::ApiError;
use crate::middleware::Identity;
use crate::models::{
    Favourite, LineItem, Order, PlaceOrderInput, SignInInput, SignUpInput, UpdateProfileInput,
    User,
};
use crate::orders::{MongoOrders, OrderService};
use crate::users::{self, UserStore};

/// Declarative route tables. Everything under `protected` sits behind the
/// token middleware; see `main` for the wiring.
pub fn public(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::post().to(sign_up))
        .route("/sessions", web::post().to(sign_in))
        .route("/products", web::get().to(list_products))
        .route("/products/{id}", web::get().to(get_product))
        .route("/designers", web::get().to(list_designers))
        .route("/designers/{id}", web::get().to(get_designer))
        .route("/designers/{id}/products", web::get().to(products_by_designer));
}

pub fn protected(cfg: &mut web::ServiceConfig) {
    cfg.route("/users/{id}/profile", web::get().to(get_profile))
        .route("/users/{id}/profile", web::put().to(update_profile))
        .route("/users/{id}/favourites", web::get().to(list_favourites))
        .route("/orders", web::post().to(place_order))
        .route("/orders/{id}", web::get().to(get_order))
        .route("/orders/{id}/relink", web::post().to(relink_order));
}

/// The identity resolved by the auth middleware. Absence means the route was
/// registered outside the protected scope, which is a wiring bug; it reads as
/// an auth failure rather than a panic.
fn identity(req: &HttpRequest) -> Result<User, ApiError> {
    req.extensions()
        .get::<Identity>()
        .map(|id| id.0.clone())
        .ok_or(ApiError::Auth)
}

/// Path-addressed user routes only ever act on the authenticated account.
fn own_identity(req: &HttpRequest, path_id: &str) -> Result<User, ApiError> {
    let user = identity(req)?;
    if user.id != path_id {
        return Err(ApiError::Auth);
    }
    Ok(user)
}

async fn sign_up(
    users: web::Data<UserStore>,
    input: web::Json<SignUpInput>,
) -> Result<HttpResponse, ApiError> {
    let user = users.create(&input).await?;
    log::info!("new account {}", user.id);
    Ok(HttpResponse::Created().json(json!({
        "userId": user.id,
        "accessToken": user.access_token,
    })))
}

async fn sign_in(
    users: web::Data<UserStore>,
    input: web::Json<SignInInput>,
) -> Result<HttpResponse, ApiError> {
    let user = users.find_by_email(&input.email).await?.ok_or(ApiError::Auth)?;
    if !users::verify_secret(&input.password, &user.password) {
        return Err(ApiError::Auth);
    }
    Ok(HttpResponse::Ok().json(json!({
        "userId": user.id,
        "accessToken": user.access_token,
    })))
}

async fn get_profile(
    users: web::Data<UserStore>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = own_identity(&req, &path)?;
    // re-read so the order list reflects links made after the token lookup
    let user = users
        .find_by_id(&user.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(profile_json(&user)))
}

async fn update_profile(
    users: web::Data<UserStore>,
    req: HttpRequest,
    path: web::Path<String>,
    input: web::Json<UpdateProfileInput>,
) -> Result<HttpResponse, ApiError> {
    let user = own_identity(&req, &path)?;
    users.update_profile(&user.id, &input).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "profile updated" })))
}

async fn list_favourites(
    favourites: web::Data<Collection<Favourite>>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = own_identity(&req, &path)?;
    let cursor = db::with_timeout(
        config.db_timeout,
        favourites.find(doc! { "user_id": &user.id }, None),
    )
    .await?;
    let saved = catalog::collect(cursor).await?;
    Ok(HttpResponse::Ok().json(favourites_json(&saved)))
}

async fn list_products(
    catalog: web::Data<CatalogStore<MongoCatalog>>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(catalog.list_products().await?))
}

async fn get_product(
    catalog: web::Data<CatalogStore<MongoCatalog>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(catalog.get_product(&path).await?))
}

async fn list_designers(
    catalog: web::Data<CatalogStore<MongoCatalog>>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(catalog.list_designers().await?))
}

async fn get_designer(
    catalog: web::Data<CatalogStore<MongoCatalog>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(catalog.get_designer(&path).await?))
}

async fn products_by_designer(
    catalog: web::Data<CatalogStore<MongoCatalog>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(catalog.products_by_designer(&path).await?))
}

async fn place_order(
    orders: web::Data<OrderService<MongoOrders>>,
    req: HttpRequest,
    input: web::Json<PlaceOrderInput>,
) -> Result<HttpResponse, ApiError> {
    // the owner is always the authenticated caller, never a body field
    let user = identity(&req)?;
    let items = input
        .items
        .iter()
        .map(|item| {
            Ok(LineItem {
                product_id: catalog::parse_object_id(&item.product_id)?,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<LineItem>, ApiError>>()?;
    let order = orders.place_order(&user.id, items).await?;
    Ok(HttpResponse::Created().json(order_json(&order)))
}

async fn get_order(
    orders: web::Data<OrderService<MongoOrders>>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = identity(&req)?;
    let order = orders.get_order(&user.id, &path).await?;
    Ok(HttpResponse::Ok().json(order_json(&order)))
}

async fn relink_order(
    orders: web::Data<OrderService<MongoOrders>>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = identity(&req)?;
    let order = orders.retry_link(&user.id, &path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "orderId": order.id,
        "linked": true,
    })))
}

fn profile_json(user: &User) -> Value {
    json!({
        "userId": user.id,
        "name": user.name,
        "email": user.email,
        "street": user.street,
        "postalCode": user.postal_code,
        "city": user.city,
        "phoneNumber": user.phone_number,
        "orders": user.orders,
        "favourites": user.favourites,
    })
}

fn order_json(order: &Order) -> Value {
    json!({
        "orderId": order.id,
        "userId": order.user_id,
        "items": order.items.iter().map(|item| json!({
            "productId": item.product_id.to_hex(),
            "quantity": item.quantity,
        })).collect::<Vec<Value>>(),
        "createdAt": order.created_at.to_rfc3339(),
    })
}

fn favourites_json(saved: &[Favourite]) -> Vec<Value> {
    saved.iter().map(favourite_json).collect()
}

fn favourite_json(favourite: &Favourite) -> Value {
    json!({
        "favouriteId": favourite.id,
        "productId": favourite.product_id.to_hex(),
        "imageUrl": favourite.image_url,
    })
}
