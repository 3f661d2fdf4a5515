use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ProductId, StockResult, StockroomError};

/// Physical dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

/// Registration request for a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub sku: String,
    pub barcode: String,
    pub name: String,
    pub category: String,
    pub supplier: String,
    pub dimensions: Option<Dimensions>,
    pub weight_g: Option<u32>,
}

/// Product reference data. Immutable for this core once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub barcode: String,
    pub name: String,
    pub category: String,
    pub supplier: String,
    pub dimensions: Option<Dimensions>,
    pub weight_g: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Read-mostly product catalog with unique SKU and barcode indexes.
///
/// Resolves decoded scan payloads (barcodes) to products for the rest of the
/// core; the scanning hardware itself is an external collaborator.
#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    by_sku: HashMap<String, ProductId>,
    by_barcode: HashMap<String, ProductId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_product(&self, spec: ProductSpec) -> StockResult<Product> {
        if spec.sku.trim().is_empty() {
            return Err(StockroomError::validation("SKU must not be empty"));
        }
        if spec.barcode.trim().is_empty() {
            return Err(StockroomError::validation("barcode must not be empty"));
        }
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StockroomError::corruption("catalog lock poisoned"))?;
        if inner.by_sku.contains_key(&spec.sku) {
            return Err(StockroomError::DuplicateSku(spec.sku));
        }
        if inner.by_barcode.contains_key(&spec.barcode) {
            return Err(StockroomError::DuplicateBarcode(spec.barcode));
        }
        let product = Product {
            id: ProductId::new(),
            sku: spec.sku,
            barcode: spec.barcode,
            name: spec.name,
            category: spec.category,
            supplier: spec.supplier,
            dimensions: spec.dimensions,
            weight_g: spec.weight_g,
            created_at: Utc::now(),
        };
        inner.by_sku.insert(product.sku.clone(), product.id);
        inner.by_barcode.insert(product.barcode.clone(), product.id);
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    pub fn get(&self, id: ProductId) -> StockResult<Product> {
        self.read(|inner| inner.products.get(&id).cloned())?
            .ok_or(StockroomError::UnknownProduct(id))
    }

    pub fn by_sku(&self, sku: &str) -> Option<Product> {
        self.read(|inner| {
            inner
                .by_sku
                .get(sku)
                .and_then(|id| inner.products.get(id))
                .cloned()
        })
        .ok()
        .flatten()
    }

    /// Resolve a decoded scan payload to a product.
    pub fn by_barcode(&self, barcode: &str) -> StockResult<Product> {
        self.read(|inner| {
            inner
                .by_barcode
                .get(barcode)
                .and_then(|id| inner.products.get(id))
                .cloned()
        })?
        .ok_or_else(|| StockroomError::UnknownBarcode(barcode.to_string()))
    }

    /// Owned snapshots of every product, ordered by id.
    pub fn list(&self) -> Vec<Product> {
        let mut out = self
            .read(|inner| inner.products.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        out.sort_by_key(|p| p.id);
        out
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> StockResult<T> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StockroomError::corruption("catalog lock poisoned"))?;
        Ok(f(&inner))
    }
}
