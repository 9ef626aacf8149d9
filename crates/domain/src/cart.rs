//! Shopping cart contents.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::LineRequest;

/// One line of a user's saved cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            variant_id: None,
        }
    }
}

impl From<CartLine> for LineRequest {
    fn from(line: CartLine) -> Self {
        LineRequest {
            product_id: line.product_id,
            quantity: line.quantity,
            variant_id: line.variant_id,
        }
    }
}
