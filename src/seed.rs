use std::collections::HashMap;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::Database;
use serde::Deserialize;

use crate::db;
use crate::errors::ApiError;
use crate::models::{Designer, Product};

#[derive(Debug, Deserialize)]
struct DesignerSeed {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSeed {
    name: String,
    price: f64,
    dimensions: String,
    category: String,
    image_url: String,
    /// Designer name; resolved to the designer's id at load time.
    designer: String,
}

const DESIGNERS_JSON: &str = include_str!("../data/designers.json");
const PRODUCTS_JSON: &str = include_str!("../data/products.json");

/// Wipes and re-populates the catalog collections from the bundled fixtures.
/// Startup-only; nothing at request time writes to the catalog.
pub async fn populate(database: &Database, timeout: Duration) -> Result<(), ApiError> {
    let designer_seeds: Vec<DesignerSeed> = serde_json::from_str(DESIGNERS_JSON)
        .map_err(|e| ApiError::Validation(format!("designers fixture is malformed: {}", e)))?;
    let product_seeds: Vec<ProductSeed> = serde_json::from_str(PRODUCTS_JSON)
        .map_err(|e| ApiError::Validation(format!("products fixture is malformed: {}", e)))?;

    let (designers, products) = build_catalog(designer_seeds, product_seeds)?;

    let designer_col = database.collection::<Designer>("designers");
    let product_col = database.collection::<Product>("products");

    db::with_timeout(timeout, product_col.delete_many(doc! {}, None)).await?;
    db::with_timeout(timeout, designer_col.delete_many(doc! {}, None)).await?;
    db::with_timeout(timeout, designer_col.insert_many(&designers, None)).await?;
    db::with_timeout(timeout, product_col.insert_many(&products, None)).await?;

    log::info!(
        "seeded catalog with {} designers and {} products",
        designers.len(),
        products.len()
    );
    Ok(())
}

/// Assigns ids to the designers, then resolves each product's designer name
/// against them. An unknown name is a fixture defect and fails the seed.
fn build_catalog(
    designer_seeds: Vec<DesignerSeed>,
    product_seeds: Vec<ProductSeed>,
) -> Result<(Vec<Designer>, Vec<Product>), ApiError> {
    let designers: Vec<Designer> = designer_seeds
        .into_iter()
        .map(|seed| Designer {
            id: ObjectId::new(),
            name: seed.name,
        })
        .collect();

    let by_name: HashMap<&str, ObjectId> = designers
        .iter()
        .map(|d| (d.name.as_str(), d.id))
        .collect();

    let products = product_seeds
        .into_iter()
        .map(|seed| {
            let designer = by_name.get(seed.designer.as_str()).copied().ok_or_else(|| {
                ApiError::Validation(format!(
                    "product '{}' references unknown designer '{}'",
                    seed.name, seed.designer
                ))
            })?;
            Ok(Product {
                id: ObjectId::new(),
                name: seed.name,
                price: seed.price,
                dimensions: seed.dimensions,
                category: seed.category,
                image_url: seed.image_url,
                designer,
            })
        })
        .collect::<Result<Vec<Product>, ApiError>>()?;

    Ok((designers, products))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_fixtures_parse_and_resolve() {
        let designers: Vec<DesignerSeed> = serde_json::from_str(DESIGNERS_JSON).unwrap();
        let products: Vec<ProductSeed> = serde_json::from_str(PRODUCTS_JSON).unwrap();
        assert!(!designers.is_empty());
        assert!(!products.is_empty());
        let (designers, products) = build_catalog(designers, products).unwrap();
        let ids: Vec<ObjectId> = designers.iter().map(|d| d.id).collect();
        assert!(products.iter().all(|p| ids.contains(&p.designer)));
    }

    #[test]
    fn unknown_designer_names_fail_the_seed() {
        let designers = vec![DesignerSeed {
            name: "Alvar Aalto".to_string(),
        }];
        let products = vec![ProductSeed {
            name: "Egg Chair".to_string(),
            price: 6500.0,
            dimensions: "86 x 95 x 79 cm".to_string(),
            category: "chairs".to_string(),
            image_url: "/images/egg.jpg".to_string(),
            designer: "Arne Jacobsen".to_string(),
        }];
        assert!(matches!(
            build_catalog(designers, products),
            Err(ApiError::Validation(_))
        ));
    }
}
