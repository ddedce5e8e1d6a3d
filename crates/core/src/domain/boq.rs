use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ComparisonError;

/// Largest accepted gap between `estimated_price * quantity` and `total_estimate`.
pub const LINE_TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoqId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoqItem {
    pub line_no: u32,
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "qty")]
    pub quantity: Decimal,
    #[serde(default)]
    pub uom: String,
    pub estimated_price: Decimal,
    pub total_estimate: Decimal,
}

/// Bill of Quantities: the buyer's itemized requirement and budget baseline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boq {
    pub id: BoqId,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub items: Vec<BoqItem>,
    #[serde(rename = "totalBOQ")]
    pub total_boq: Decimal,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Boq {
    pub fn validate(&self) -> Result<(), ComparisonError> {
        if self.id.0.trim().is_empty() {
            return Err(ComparisonError::Validation("boq id is required".to_string()));
        }

        if self.total_boq <= Decimal::ZERO {
            return Err(ComparisonError::Validation(format!(
                "boq `{}` total must be greater than zero, got {}",
                self.id.0, self.total_boq
            )));
        }

        let mut seen_lines = HashSet::new();
        for item in &self.items {
            if !seen_lines.insert(item.line_no) {
                return Err(ComparisonError::Validation(format!(
                    "boq `{}` has duplicate line number {}",
                    self.id.0, item.line_no
                )));
            }
            item.validate()?;
        }

        Ok(())
    }
}

impl BoqItem {
    fn validate(&self) -> Result<(), ComparisonError> {
        let line = self.line_no;
        if self.sku.trim().is_empty() {
            return Err(ComparisonError::Validation(format!("boq line {line} is missing a sku")));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ComparisonError::Validation(format!(
                "boq line {line} quantity must be greater than zero"
            )));
        }
        if self.estimated_price < Decimal::ZERO {
            return Err(ComparisonError::Validation(format!(
                "boq line {line} estimated price cannot be negative"
            )));
        }

        let overflow =
            || ComparisonError::Validation(format!("boq line {line} total overflows"));
        let computed = self.estimated_price.checked_mul(self.quantity).ok_or_else(overflow)?;
        let drift = computed.checked_sub(self.total_estimate).ok_or_else(overflow)?;
        if drift.abs() > LINE_TOTAL_TOLERANCE {
            return Err(ComparisonError::Validation(format!(
                "boq line {line} total estimate {} does not match price x qty ({computed})",
                self.total_estimate
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Boq, BoqId, BoqItem};
    use crate::errors::ComparisonError;

    fn item(line_no: u32, sku: &str, qty: i64, price: Decimal) -> BoqItem {
        BoqItem {
            line_no,
            sku: sku.to_string(),
            description: None,
            quantity: Decimal::from(qty),
            uom: "UNIT".to_string(),
            estimated_price: price,
            total_estimate: price * Decimal::from(qty),
        }
    }

    fn boq(items: Vec<BoqItem>) -> Boq {
        Boq {
            id: BoqId("boq-1".to_string()),
            currency: "USD".to_string(),
            items,
            total_boq: Decimal::new(3_225_000, 2),
        }
    }

    #[test]
    fn accepts_consistent_boq() {
        let boq = boq(vec![
            item(1, "WIDGET-100", 500, Decimal::new(4500, 2)),
            item(2, "WIDGET-200", 300, Decimal::new(3250, 2)),
        ]);
        assert_eq!(boq.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_total() {
        let mut boq = boq(Vec::new());
        boq.total_boq = Decimal::ZERO;
        assert!(matches!(boq.validate(), Err(ComparisonError::Validation(message)) if message.contains("greater than zero")));
    }

    #[test]
    fn rejects_duplicate_line_numbers() {
        let boq = boq(vec![
            item(1, "WIDGET-100", 500, Decimal::new(4500, 2)),
            item(1, "WIDGET-200", 300, Decimal::new(3250, 2)),
        ]);
        assert!(matches!(boq.validate(), Err(ComparisonError::Validation(message)) if message.contains("duplicate line")));
    }

    #[test]
    fn tolerates_rounding_on_line_total_but_not_real_mismatch() {
        let mut rounded = item(1, "WIDGET-100", 3, Decimal::new(3333, 2));
        rounded.total_estimate = Decimal::new(10000, 2);
        assert_eq!(boq(vec![rounded]).validate(), Ok(()));

        let mut wrong = item(1, "WIDGET-100", 3, Decimal::new(3333, 2));
        wrong.total_estimate = Decimal::new(12000, 2);
        assert!(boq(vec![wrong]).validate().is_err());
    }

    #[test]
    fn rejects_line_whose_total_overflows() {
        let raw = r#"{
            "id": "boq-huge",
            "items": [
                {"lineNo": 1, "sku": "WIDGET-100", "qty": 1e20,
                 "estimatedPrice": 1e20, "totalEstimate": 1}
            ],
            "totalBOQ": 1
        }"#;
        let boq: Boq = serde_json::from_str(raw).expect("boq json");

        assert!(matches!(
            boq.validate(),
            Err(ComparisonError::Validation(message)) if message == "boq line 1 total overflows"
        ));
    }

    #[test]
    fn deserializes_ingestion_shape() {
        let raw = r#"{
            "id": "boq-42",
            "currency": "USD",
            "items": [
                {"lineNo": 1, "sku": "WIDGET-100", "qty": 500, "uom": "UNIT",
                 "estimatedPrice": 45.0, "totalEstimate": 22500.0}
            ],
            "totalBOQ": 22500.0
        }"#;
        let boq: Boq = serde_json::from_str(raw).expect("boq json");
        assert_eq!(boq.items[0].quantity, Decimal::from(500));
        assert_eq!(boq.total_boq, Decimal::from(22500));
    }
}
