use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ComparisonError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    /// BOQ line this item answers; used as the matching key when `sku` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boq_line_no: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub unit_price: Decimal,
    #[serde(rename = "qty")]
    pub quantity: Decimal,
    #[serde(default, rename = "minQty", skip_serializing_if = "Option::is_none")]
    pub min_order_quantity: Option<Decimal>,
    #[serde(default, rename = "leadTime", skip_serializing_if = "Option::is_none")]
    pub lead_time_days: Option<u32>,
    #[serde(default, rename = "tax")]
    pub tax_rate: Decimal,
    pub line_total: Decimal,
}

impl QuoteItem {
    /// Trimmed SKU, or `None` when the vendor left it blank.
    pub fn sku_key(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|sku| !sku.is_empty())
    }
}

/// A vendor's priced response to a BOQ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub items: Vec<QuoteItem>,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub total_cost: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,
}

impl Quote {
    /// `index` is the quote's position in the submitted list, used in error messages.
    pub fn validate(&self, index: usize) -> Result<(), ComparisonError> {
        let invalid = |detail: String| ComparisonError::Validation(format!("quote #{index}: {detail}"));

        if self.vendor_id.0.trim().is_empty() {
            return Err(invalid("vendor id is required".to_string()));
        }
        if self.vendor_name.trim().is_empty() {
            return Err(invalid("vendor name is required".to_string()));
        }
        if self.total_cost < Decimal::ZERO {
            return Err(invalid(format!("total cost cannot be negative, got {}", self.total_cost)));
        }
        if self.shipping_cost < Decimal::ZERO {
            return Err(invalid("shipping cost cannot be negative".to_string()));
        }
        if self.discount_percent < Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err(invalid(format!(
                "discount percent must be within 0..=100, got {}",
                self.discount_percent
            )));
        }

        for (position, item) in self.items.iter().enumerate() {
            if item.quantity <= Decimal::ZERO {
                return Err(invalid(format!("item {position} quantity must be greater than zero")));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(invalid(format!("item {position} unit price cannot be negative")));
            }
        }

        Ok(())
    }
}
