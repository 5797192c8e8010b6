use std::time::Duration;

use futures::stream::StreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::Collection;
use serde::Serialize;

use crate::db;
use crate::errors::ApiError;
use crate::models::{Designer, Product};

/// Persistence surface of the catalog reads. Tests swap in an in-memory
/// table, as they do for order placement.
#[allow(async_fn_in_trait)]
pub trait CatalogBackend: Clone + 'static {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError>;
    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, ApiError>;
    async fn products_by_designer(&self, designer: ObjectId) -> Result<Vec<Product>, ApiError>;
    async fn list_designers(&self) -> Result<Vec<Designer>, ApiError>;
    async fn find_designer(&self, id: ObjectId) -> Result<Option<Designer>, ApiError>;
}

#[derive(Clone)]
pub struct MongoCatalog {
    products: Collection<Product>,
    designers: Collection<Designer>,
    timeout: Duration,
}

impl MongoCatalog {
    pub fn new(
        products: Collection<Product>,
        designers: Collection<Designer>,
        timeout: Duration,
    ) -> Self {
        MongoCatalog {
            products,
            designers,
            timeout,
        }
    }
}

impl CatalogBackend for MongoCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let cursor = db::with_timeout(self.timeout, self.products.find(None, None)).await?;
        collect(cursor).await
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, ApiError> {
        db::with_timeout(
            self.timeout,
            self.products.find_one(doc! { "_id": id }, None),
        )
        .await
    }

    async fn products_by_designer(&self, designer: ObjectId) -> Result<Vec<Product>, ApiError> {
        let cursor = db::with_timeout(
            self.timeout,
            self.products.find(doc! { "designer": designer }, None),
        )
        .await?;
        collect(cursor).await
    }

    async fn list_designers(&self) -> Result<Vec<Designer>, ApiError> {
        let cursor = db::with_timeout(self.timeout, self.designers.find(None, None)).await?;
        collect(cursor).await
    }

    async fn find_designer(&self, id: ObjectId) -> Result<Option<Designer>, ApiError> {
        db::with_timeout(
            self.timeout,
            self.designers.find_one(doc! { "_id": id }, None),
        )
        .await
    }
}

/// Response shape for a product. `designer_name` is resolved with an explicit
/// read-time join on the by-id lookup; listings leave it out and carry only
/// the designer id.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub dimensions: String,
    pub category: String,
    pub image_url: String,
    pub designer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designer_name: Option<String>,
}

impl ProductView {
    pub fn unresolved(product: &Product) -> Self {
        Self::resolved(product, None)
    }

    pub fn resolved(product: &Product, designer_name: Option<String>) -> Self {
        ProductView {
            id: product.id.to_hex(),
            name: product.name.clone(),
            price: product.price,
            dimensions: product.dimensions.clone(),
            category: product.category.clone(),
            image_url: product.image_url.clone(),
            designer: product.designer.to_hex(),
            designer_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DesignerView {
    pub id: String,
    pub name: String,
}

impl From<&Designer> for DesignerView {
    fn from(designer: &Designer) -> Self {
        DesignerView {
            id: designer.id.to_hex(),
            name: designer.name.clone(),
        }
    }
}

pub fn parse_object_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::InvalidId(raw.to_string()))
}

/// Read-only view over products and designers. Writes only ever come from the
/// seed loader.
#[derive(Clone)]
pub struct CatalogStore<B: CatalogBackend> {
    backend: B,
}

impl<B: CatalogBackend> CatalogStore<B> {
    pub fn new(backend: B) -> Self {
        CatalogStore { backend }
    }

    pub async fn list_products(&self) -> Result<Vec<ProductView>, ApiError> {
        let products = self.backend.list_products().await?;
        Ok(products.iter().map(ProductView::unresolved).collect())
    }

    pub async fn get_product(&self, raw_id: &str) -> Result<ProductView, ApiError> {
        let id = parse_object_id(raw_id)?;
        let product = self
            .backend
            .find_product(id)
            .await?
            .ok_or(ApiError::NotFound("product"))?;
        let designer = self.backend.find_designer(product.designer).await?;
        Ok(ProductView::resolved(&product, designer.map(|d| d.name)))
    }

    pub async fn list_designers(&self) -> Result<Vec<DesignerView>, ApiError> {
        let designers = self.backend.list_designers().await?;
        Ok(designers.iter().map(DesignerView::from).collect())
    }

    pub async fn get_designer(&self, raw_id: &str) -> Result<DesignerView, ApiError> {
        let id = parse_object_id(raw_id)?;
        let designer = self
            .backend
            .find_designer(id)
            .await?
            .ok_or(ApiError::NotFound("designer"))?;
        Ok(DesignerView::from(&designer))
    }

    pub async fn products_by_designer(&self, raw_id: &str) -> Result<Vec<ProductView>, ApiError> {
        let id = parse_object_id(raw_id)?;
        let products = self.backend.products_by_designer(id).await?;
        Ok(products.iter().map(ProductView::unresolved).collect())
    }
}

pub(crate) async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, ApiError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        items.push(result.map_err(|e| ApiError::Persistence(e.to_string()))?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct MemoryCatalog {
        products: Rc<Vec<Product>>,
        designers: Rc<Vec<Designer>>,
    }

    impl CatalogBackend for MemoryCatalog {
        async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
            Ok(self.products.to_vec())
        }

        async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, ApiError> {
            Ok(self.products.iter().find(|p| p.id == id).cloned())
        }

        async fn products_by_designer(
            &self,
            designer: ObjectId,
        ) -> Result<Vec<Product>, ApiError> {
            Ok(self
                .products
                .iter()
                .filter(|p| p.designer == designer)
                .cloned()
                .collect())
        }

        async fn list_designers(&self) -> Result<Vec<Designer>, ApiError> {
            Ok(self.designers.to_vec())
        }

        async fn find_designer(&self, id: ObjectId) -> Result<Option<Designer>, ApiError> {
            Ok(self.designers.iter().find(|d| d.id == id).cloned())
        }
    }

    fn product_named(name: &str, designer: ObjectId) -> Product {
        Product {
            id: ObjectId::new(),
            name: name.to_string(),
            price: 4200.0,
            dimensions: "66 x 80 x 64 cm".to_string(),
            category: "chairs".to_string(),
            image_url: "/images/paimio-armchair.jpg".to_string(),
            designer,
        }
    }

    fn store_with(
        products: Vec<Product>,
        designers: Vec<Designer>,
    ) -> CatalogStore<MemoryCatalog> {
        CatalogStore::new(MemoryCatalog {
            products: Rc::new(products),
            designers: Rc::new(designers),
        })
    }

    #[test]
    fn malformed_ids_are_invalid_not_absent() {
        assert!(matches!(
            parse_object_id("not-an-object-id"),
            Err(ApiError::InvalidId(_))
        ));
    }

    #[test]
    fn well_formed_ids_parse() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
    }

    #[actix_web::test]
    async fn malformed_ids_are_rejected_before_the_store_is_asked() {
        let store = store_with(Vec::new(), Vec::new());
        assert!(matches!(
            store.get_product("not-an-object-id").await,
            Err(ApiError::InvalidId(_))
        ));
        assert!(matches!(
            store.products_by_designer("junk").await,
            Err(ApiError::InvalidId(_))
        ));
    }

    #[actix_web::test]
    async fn absent_well_formed_ids_are_not_found() {
        let store = store_with(Vec::new(), Vec::new());
        assert!(matches!(
            store.get_product(&ObjectId::new().to_hex()).await,
            Err(ApiError::NotFound("product"))
        ));
        assert!(matches!(
            store.get_designer(&ObjectId::new().to_hex()).await,
            Err(ApiError::NotFound("designer"))
        ));
    }

    #[actix_web::test]
    async fn product_lookup_resolves_the_designer_name() {
        let designer = Designer {
            id: ObjectId::new(),
            name: "Alvar Aalto".to_string(),
        };
        let product = product_named("Paimio Armchair", designer.id);
        let product_id = product.id.to_hex();
        let store = store_with(vec![product], vec![designer]);

        let view = store.get_product(&product_id).await.unwrap();
        assert_eq!(view.name, "Paimio Armchair");
        assert_eq!(view.designer_name.as_deref(), Some("Alvar Aalto"));
    }

    #[actix_web::test]
    async fn dangling_designer_refs_leave_the_name_unresolved() {
        let product = product_named("Orphan Chair", ObjectId::new());
        let product_id = product.id.to_hex();
        let store = store_with(vec![product], Vec::new());

        let view = store.get_product(&product_id).await.unwrap();
        assert!(view.designer_name.is_none());
    }

    #[actix_web::test]
    async fn by_designer_listing_is_exactly_the_matching_subset() {
        let aalto = ObjectId::new();
        let jacobsen = ObjectId::new();
        let store = store_with(
            vec![
                product_named("Paimio Armchair", aalto),
                product_named("Stool 60", aalto),
                product_named("Egg Chair", jacobsen),
            ],
            Vec::new(),
        );

        let views = store.products_by_designer(&aalto.to_hex()).await.unwrap();
        let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Paimio Armchair"));
        assert!(names.contains(&"Stool 60"));
    }

    #[test]
    fn resolved_view_embeds_the_designer_name() {
        let designer = ObjectId::new();
        let view = ProductView::resolved(
            &product_named("Paimio Armchair", designer),
            Some("Alvar Aalto".to_string()),
        );
        assert_eq!(view.designer, designer.to_hex());
        assert_eq!(view.designer_name.as_deref(), Some("Alvar Aalto"));
    }

    #[test]
    fn listing_view_leaves_the_designer_unresolved() {
        let view = ProductView::unresolved(&product_named("Stool 60", ObjectId::new()));
        assert!(view.designer_name.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("designerName").is_none());
        assert!(json.get("imageUrl").is_some());
    }
}
