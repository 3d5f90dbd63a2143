//! Checkout request and result types.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;

/// One purchasable line, priced in major currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    #[serde(alias = "unitPrice")]
    pub price: Decimal,
    pub quantity: u32,
}

/// A request to open a hosted checkout for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub order_id: String,
    /// ISO 4217 code, passed through to Stripe as given
    pub currency: String,
    pub items: Vec<LineItem>,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.order_id.trim().is_empty() {
            return Err(CheckoutError::InvalidRequest("orderId is required".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(CheckoutError::InvalidRequest("currency is required".into()));
        }
        if self.items.is_empty() {
            return Err(CheckoutError::InvalidRequest("items must not be empty".into()));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(CheckoutError::InvalidRequest(format!("items[{}].name is required", i)));
            }
            if item.price <= Decimal::ZERO {
                return Err(CheckoutError::InvalidRequest(format!(
                    "items[{}].price must be positive",
                    i
                )));
            }
            if item.quantity < 1 {
                return Err(CheckoutError::InvalidRequest(format!(
                    "items[{}].quantity must be at least 1",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// URLs handed back to the caller once a session exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResult {
    pub cancel_url: String,
    pub success_url: String,
    /// Hosted checkout page the payer is sent to
    #[serde(rename = "url")]
    pub session_url: String,
}

/// Convert a major-unit amount to Stripe's integer minor units.
///
/// Rounds half away from zero on the exact decimal value, so 19.995 becomes
/// 2000. Returns `None` if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            order_id: "ord_9".to_string(),
            currency: "usd".to_string(),
            items: vec![LineItem {
                name: "A".to_string(),
                price: dec!(19.995),
                quantity: 2,
            }],
        }
    }

    #[test]
    fn test_to_minor_units_rounds_half_up() {
        assert_eq!(to_minor_units(dec!(19.995)), Some(2000));
        assert_eq!(to_minor_units(dec!(19.994)), Some(1999));
        assert_eq!(to_minor_units(dec!(20)), Some(2000));
        assert_eq!(to_minor_units(dec!(0.005)), Some(1));
        assert_eq!(to_minor_units(dec!(15.0000)), Some(1500));
    }

    #[test]
    fn test_to_minor_units_overflow() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
    }

    #[test]
    fn test_validate_ok() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_items() {
        let req = CheckoutRequest {
            items: vec![],
            ..request()
        };
        assert!(matches!(req.validate(), Err(CheckoutError::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_price() {
        let mut req = request();
        req.items[0].price = dec!(0);
        assert!(req.validate().is_err());
        req.items[0].price = dec!(-1.50);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_order_id() {
        let req = CheckoutRequest {
            order_id: " ".to_string(),
            ..request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let req: CheckoutRequest = serde_json::from_str(
            r#"{"orderId":"ord_9","currency":"usd","items":[{"name":"A","price":"19.995","quantity":2},{"name":"B","unitPrice":5,"quantity":1}]}"#,
        )
        .unwrap();

        assert_eq!(req.order_id, "ord_9");
        assert_eq!(req.items[0].price, dec!(19.995));
        assert_eq!(req.items[1].price, dec!(5));
    }

    #[test]
    fn test_result_json_shape() {
        let result = CheckoutSessionResult {
            cancel_url: "https://c".to_string(),
            success_url: "https://s".to_string(),
            session_url: "https://u".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({"cancelUrl": "https://c", "successUrl": "https://s", "url": "https://u"})
        );
    }
}
