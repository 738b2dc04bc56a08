//! Seed the product catalog from YAML.
//!
//! Products are inserted one by one; a product whose name already exists is
//! skipped, so the command can be re-run safely.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use quitanda_core::Money;
use quitanda_storefront::db::{self, ProductRepository, RepositoryError, products::NewProduct};

use super::migrate::database_url;

/// Catalog file used when `--file` is not given.
pub const DEFAULT_PRODUCTS_FILE: &str = "crates/cli/seed/products.yaml";

/// Top level of the catalog file.
#[derive(Debug, Deserialize)]
struct Catalog {
    products: Vec<ProductEntry>,
}

/// One product as written in YAML.
#[derive(Debug, Deserialize)]
struct ProductEntry {
    name: String,
    description: Option<String>,
    /// Decimal string, e.g. `"45.00"`.
    price: String,
    stock: i32,
    image: Option<String>,
    #[serde(default = "available")]
    is_available: bool,
}

const fn available() -> bool {
    true
}

impl TryFrom<ProductEntry> for NewProduct {
    type Error = String;

    fn try_from(entry: ProductEntry) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&entry.price)
            .map_err(|e| format!("{}: invalid price {:?}: {e}", entry.name, entry.price))?;
        let price = Money::new(amount).map_err(|e| format!("{}: {e}", entry.name))?;
        if entry.stock < 0 {
            return Err(format!("{}: stock cannot be negative", entry.name));
        }

        Ok(Self {
            name: entry.name,
            description: entry.description,
            price,
            stock: entry.stock,
            image: entry.image,
            is_available: entry.is_available,
        })
    }
}

/// Parse and validate a catalog file's contents.
fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, Box<dyn std::error::Error>> {
    let catalog: Catalog = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(catalog.products.len());
    let mut errors = Vec::new();
    for entry in catalog.products {
        match NewProduct::try_from(entry) {
            Ok(product) => products.push(product),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(products)
}

/// Insert the products listed in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or the database
/// is unreachable. Individual insert failures are reported and counted.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_catalog(&content)?;
    info!(products = products.len(), "Parsed catalog");

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = ProductRepository::new(&pool);
    let (mut inserted, mut skipped, mut failed) = (0_usize, 0_usize, 0_usize);
    for product in &products {
        match repo.insert(product).await {
            Ok(created) => {
                info!(id = %created.id, name = %created.name, "Inserted product");
                inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(name = %product.name, "Product already exists, skipping");
                skipped += 1;
            }
            Err(e) => {
                error!(name = %product.name, error = %e, "Failed to insert product");
                failed += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    if failed > 0 {
        error!("  Errors: {failed}");
        return Err(format!("{failed} products could not be inserted").into());
    }

    Ok(())
}
