use std::str::FromStr;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use stockroom_allocation::AllocationPolicy;
use stockroom_catalog::{Dimensions, ProductSpec};
use stockroom_core::LocationId;
use stockroom_inbound::{PoItemSpec, PurchaseOrderSpec};
use stockroom_locations::{Address, LocationSpec};
use stockroom_outbound::{OrderItemSpec, OrderPriority, OrderSpec};
use stockroom_warehouse::ScanTask;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub sku: String,
    pub barcode: String,
    pub name: String,
    pub category: String,
    pub supplier: String,
    pub dimensions: Option<Dimensions>,
    pub weight_g: Option<u32>,
}

impl RegisterProductRequest {
    pub fn into_spec(self) -> ProductSpec {
        ProductSpec {
            sku: self.sku,
            barcode: self.barcode,
            name: self.name,
            category: self.category,
            supplier: self.supplier,
            dimensions: self.dimensions,
            weight_g: self.weight_g,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterLocationRequest {
    pub zone: String,
    pub aisle: u32,
    pub rack: u32,
    pub bin: u32,
    pub capacity: u64,
}

impl RegisterLocationRequest {
    pub fn into_spec(self) -> LocationSpec {
        LocationSpec {
            address: Address {
                zone: self.zone,
                aisle: self.aisle,
                rack: self.rack,
                bin: self.bin,
            },
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderLineRequest {
    pub product_id: String,
    pub expected_quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub reference: String,
    pub supplier: String,
    pub expected_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_over_receipt: bool,
    pub items: Vec<PurchaseOrderLineRequest>,
}

impl CreatePurchaseOrderRequest {
    pub fn into_spec(self) -> Result<PurchaseOrderSpec, axum::response::Response> {
        let items = self
            .items
            .into_iter()
            .map(|line| {
                Ok(PoItemSpec {
                    product_id: parse_id(&line.product_id, "product id")?,
                    expected_quantity: line.expected_quantity,
                })
            })
            .collect::<Result<Vec<_>, axum::response::Response>>()?;
        Ok(PurchaseOrderSpec {
            reference: self.reference,
            supplier: self.supplier,
            expected_date: self.expected_date,
            allow_over_receipt: self.allow_over_receipt,
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordReceiptRequest {
    pub product_id: String,
    pub location_id: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub reference: String,
    pub customer: String,
    pub priority: Option<OrderPriority>,
    pub items: Vec<OrderLineRequest>,
}

impl CreateOrderRequest {
    pub fn into_spec(self) -> Result<OrderSpec, axum::response::Response> {
        let items = self
            .items
            .into_iter()
            .map(|line| {
                Ok(OrderItemSpec {
                    product_id: parse_id(&line.product_id, "product id")?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, axum::response::Response>>()?;
        Ok(OrderSpec {
            reference: self.reference,
            customer: self.customer,
            priority: self.priority.unwrap_or(OrderPriority::Medium),
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AllocateOrderRequest {
    #[serde(default)]
    pub policy: AllocationPolicy,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPickRequest {
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub location_id: String,
    pub delta: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CountStockRequest {
    pub product_id: String,
    pub location_id: String,
    pub counted: u64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
    pub location_hint: Option<LocationId>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub task: ScanTask,
}

// -------------------------
// Mapping helpers
// -------------------------

/// Parse a path/body id string, answering 400 on garbage input.
pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what}: {raw:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::ProductId;

    #[test]
    fn well_formed_ids_parse() {
        let id = ProductId::new();
        let parsed: ProductId = parse_id(&id.to_string(), "product id").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn garbage_ids_answer_bad_request() {
        let err = parse_id::<ProductId>("not-a-uuid", "product id").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn purchase_order_request_maps_to_spec() {
        let product_id = ProductId::new();
        let req = CreatePurchaseOrderRequest {
            reference: "PO-2024-001".to_string(),
            supplier: "Initech Supply".to_string(),
            expected_date: None,
            allow_over_receipt: false,
            items: vec![PurchaseOrderLineRequest {
                product_id: product_id.to_string(),
                expected_quantity: 40,
            }],
        };
        let spec = req.into_spec().unwrap();
        assert_eq!(spec.items[0].product_id, product_id);
        assert_eq!(spec.items[0].expected_quantity, 40);
    }

    #[test]
    fn order_priority_defaults_to_medium() {
        let req = CreateOrderRequest {
            reference: "ORD-2024-001".to_string(),
            customer: "Acme Retail".to_string(),
            priority: None,
            items: vec![OrderLineRequest {
                product_id: ProductId::new().to_string(),
                quantity: 2,
            }],
        };
        let spec = req.into_spec().unwrap();
        assert_eq!(spec.priority, OrderPriority::Medium);
    }

    #[test]
    fn scan_request_deserializes_both_task_kinds() {
        let pick: ScanRequest = serde_json::from_value(serde_json::json!({
            "barcode": "890123000001",
            "task": {
                "kind": "pick",
                "order_item_id": stockroom_core::OrderItemId::new().to_string(),
            }
        }))
        .unwrap();
        assert!(matches!(pick.task, ScanTask::Pick { .. }));

        let receive: ScanRequest = serde_json::from_value(serde_json::json!({
            "barcode": "890123000001",
            "location_hint": stockroom_core::LocationId::new().to_string(),
            "task": {
                "kind": "receive",
                "purchase_order_id": stockroom_core::PurchaseOrderId::new().to_string(),
            }
        }))
        .unwrap();
        assert!(matches!(receive.task, ScanTask::Receive { .. }));
    }
}
