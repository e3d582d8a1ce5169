//! Seed the database with a small demo catalog.
//!
//! Rows are looked up by slug or warehouse code first, so running the
//! command twice leaves the database unchanged.

use bazaar_core::{CategoryId, Sku, Slug};
use bazaar_server::db::categories::CategoryInput;
use bazaar_server::db::inventory::WarehouseInput;
use bazaar_server::db::products::ProductInput;
use bazaar_server::db::{CategoryRepository, InventoryRepository, ProductRepository};
use bazaar_server::models::{Category, Product, Warehouse};
use bazaar_server::services::inventory::InventoryService;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

use super::connect;

struct DemoProduct {
    name: &'static str,
    sku: &'static str,
    category: &'static str,
    description: &'static str,
    /// Price in cents.
    price: i64,
    stock: i32,
    featured: bool,
}

const CATEGORIES: &[(&str, &str)] = &[
    ("Apparel", "Shirts, hoodies and hats"),
    ("Accessories", "Bags, mugs and stickers"),
];

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        name: "Classic Tee",
        sku: "TEE-CLASSIC",
        category: "apparel",
        description: "Heavyweight cotton t-shirt.",
        price: 2500,
        stock: 120,
        featured: true,
    },
    DemoProduct {
        name: "Zip Hoodie",
        sku: "HOODIE-ZIP",
        category: "apparel",
        description: "Fleece-lined zip hoodie.",
        price: 6000,
        stock: 40,
        featured: false,
    },
    DemoProduct {
        name: "Canvas Tote",
        sku: "TOTE-CANVAS",
        category: "accessories",
        description: "Sturdy canvas tote bag.",
        price: 1800,
        stock: 75,
        featured: true,
    },
    DemoProduct {
        name: "Enamel Mug",
        sku: "MUG-ENAMEL",
        category: "accessories",
        description: "Camp-style enamel mug.",
        price: 1400,
        stock: 8,
        featured: false,
    },
];

const WAREHOUSE_CODE: &str = "MAIN";

/// Insert whatever part of the demo catalog is missing.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;

    let categories = seed_categories(&pool).await?;
    let products = seed_products(&pool, &categories).await?;
    let warehouse = seed_warehouse(&pool).await?;

    let inventory = InventoryService::new(&pool);
    for product in &products {
        inventory
            .set_level(warehouse.id, product.id, product.stock, 0)
            .await?;
    }

    info!("Seeding complete!");
    info!("  Categories: {}", categories.len());
    info!("  Products: {}", products.len());
    info!("  Warehouse: {} ({})", warehouse.name, warehouse.code);
    Ok(())
}

async fn seed_categories(pool: &PgPool) -> Result<Vec<Category>, Box<dyn std::error::Error>> {
    let repo = CategoryRepository::new(pool);
    let existing = repo.list(false).await?;

    let mut seeded = Vec::with_capacity(CATEGORIES.len());
    for (name, description) in CATEGORIES {
        let slug = Slug::from_name(name)?;
        if let Some(category) = existing.iter().find(|c| c.slug == slug) {
            seeded.push(category.clone());
            continue;
        }
        let category = repo
            .create(&CategoryInput {
                name,
                slug: &slug,
                description: Some(description),
                parent_id: None,
                sort_order: 0,
                is_active: true,
            })
            .await?;
        info!(slug = %category.slug, "Created category");
        seeded.push(category);
    }
    Ok(seeded)
}

async fn seed_products(
    pool: &PgPool,
    categories: &[Category],
) -> Result<Vec<Product>, Box<dyn std::error::Error>> {
    let repo = ProductRepository::new(pool);
    let category_id = |slug: &str| -> Option<CategoryId> {
        categories
            .iter()
            .find(|c| c.slug.as_str() == slug)
            .map(|c| c.id)
    };

    let mut seeded = Vec::with_capacity(PRODUCTS.len());
    for demo in PRODUCTS {
        let slug = Slug::from_name(demo.name)?;
        if let Some(product) = repo.get_by_slug(&slug).await? {
            seeded.push(product);
            continue;
        }
        let sku = Sku::parse(demo.sku)?;
        let product = repo
            .create(&ProductInput {
                name: demo.name,
                slug: &slug,
                sku: &sku,
                description: Some(demo.description),
                price: Decimal::new(demo.price, 2),
                compare_at_price: None,
                sale_price: None,
                sale_starts_at: None,
                sale_ends_at: None,
                stock: demo.stock,
                category_id: category_id(demo.category),
                is_active: true,
                is_featured: demo.featured,
                is_on_sale: false,
                images: &[],
            })
            .await?;
        info!(slug = %product.slug, sku = %product.sku, "Created product");
        seeded.push(product);
    }
    Ok(seeded)
}

async fn seed_warehouse(pool: &PgPool) -> Result<Warehouse, Box<dyn std::error::Error>> {
    let repo = InventoryRepository::new(pool);
    if let Some(warehouse) = repo
        .warehouses()
        .await?
        .into_iter()
        .find(|w| w.code == WAREHOUSE_CODE)
    {
        return Ok(warehouse);
    }

    let warehouse = repo
        .create_warehouse(&WarehouseInput {
            name: "Main Warehouse",
            code: WAREHOUSE_CODE,
            address: None,
            is_active: true,
        })
        .await?;
    info!(code = %warehouse.code, "Created warehouse");
    Ok(warehouse)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_data_is_well_formed() {
        for (name, _) in CATEGORIES {
            Slug::from_name(name).unwrap();
        }
        for demo in PRODUCTS {
            Slug::from_name(demo.name).unwrap();
            Sku::parse(demo.sku).unwrap();
            assert!(
                CATEGORIES
                    .iter()
                    .any(|(name, _)| Slug::from_name(name).unwrap().as_str() == demo.category),
                "{} has unknown category {}",
                demo.name,
                demo.category
            );
        }
    }
}
