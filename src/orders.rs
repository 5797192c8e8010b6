use std::time::Duration;

use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Collection;
use uuid::Uuid;

use crate::db;
use crate::errors::ApiError;
use crate::models::{LineItem, Order};
use crate::users::UserStore;

/// Persistence surface of order placement: create, lookup, and the
/// append-to-list link on the owning user. Tests swap in an in-memory
/// implementation with an injectable link failure.
#[allow(async_fn_in_trait)]
pub trait OrderBackend: Clone + 'static {
    async fn insert_order(&self, order: &Order) -> Result<(), ApiError>;
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, ApiError>;
    async fn link_order(&self, user_id: &str, order_id: &str) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct MongoOrders {
    orders: Collection<Order>,
    users: UserStore,
    timeout: Duration,
}

impl MongoOrders {
    pub fn new(orders: Collection<Order>, users: UserStore, timeout: Duration) -> Self {
        MongoOrders {
            orders,
            users,
            timeout,
        }
    }
}

impl OrderBackend for MongoOrders {
    async fn insert_order(&self, order: &Order) -> Result<(), ApiError> {
        db::with_timeout(self.timeout, self.orders.insert_one(order, None)).await?;
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, ApiError> {
        db::with_timeout(
            self.timeout,
            self.orders.find_one(doc! { "id": order_id }, None),
        )
        .await
    }

    async fn link_order(&self, user_id: &str, order_id: &str) -> Result<(), ApiError> {
        self.users.push_order(user_id, order_id).await
    }
}

/// Places orders in two steps: persist the order, then link its id into the
/// owner's order list. The steps are not atomic; a failure after the first
/// leaves a persisted, unlinked order, reported as `OrderUnlinked` so the
/// caller can retry the link. The link uses `$addToSet`, so retries converge
/// instead of duplicating.
#[derive(Clone)]
pub struct OrderService<B: OrderBackend> {
    backend: B,
}

impl<B: OrderBackend> OrderService<B> {
    pub fn new(backend: B) -> Self {
        OrderService { backend }
    }

    /// `user_id` always comes from the authenticated identity; callers must
    /// never take it from the request body.
    pub async fn place_order(
        &self,
        user_id: &str,
        items: Vec<LineItem>,
    ) -> Result<Order, ApiError> {
        validate_items(&items)?;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            items,
            created_at: Utc::now(),
        };

        // step 1: a failure here aborts cleanly, nothing was linked
        self.backend.insert_order(&order).await?;

        // step 2: the known inconsistency window
        if let Err(e) = self.backend.link_order(user_id, &order.id).await {
            return Err(ApiError::OrderUnlinked {
                order_id: order.id,
                reason: e.to_string(),
            });
        }
        Ok(order)
    }

    /// Re-runs the link step for an existing order owned by `user_id`.
    /// Idempotent, so safe to call until it succeeds.
    pub async fn retry_link(&self, user_id: &str, order_id: &str) -> Result<Order, ApiError> {
        let order = self.get_order(user_id, order_id).await?;
        self.backend.link_order(user_id, order_id).await?;
        Ok(order)
    }

    pub async fn get_order(&self, user_id: &str, order_id: &str) -> Result<Order, ApiError> {
        let order = self
            .backend
            .find_order(order_id)
            .await?
            .ok_or(ApiError::NotFound("order"))?;
        if order.user_id != user_id {
            return Err(ApiError::Auth);
        }
        Ok(order)
    }
}

fn validate_items(items: &[LineItem]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::Validation(
            "an order needs at least one line item".to_string(),
        ));
    }
    if items.iter().any(|item| item.quantity == 0) {
        return Err(ApiError::Validation(
            "line item quantity must be positive".to_string(),
        ));
    }
    Ok(())
}
