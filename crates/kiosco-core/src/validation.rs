//! # Validation Module
//!
//! Input validation for the register's forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register front end                                           │
//! │  ├── Amount parsing (Money::from_str)                                  │
//! │  └── Confirmation prompts (zero opening cash, closing)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Shift ledger (Rust)                                          │
//! │  ├── THIS MODULE: field shape and range                                │
//! │  └── Shift rules: single active shift, cash guard, payment split       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── One active shift (partial unique index)                           │
//! │  ├── One closure per shift (UNIQUE)                                    │
//! │  └── Append-only ledger tables (UPDATE triggers)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Text validators return the trimmed value so callers store exactly what
//! was checked.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SaleItem;
use crate::{MAX_AMOUNT, MAX_ITEM_QUANTITY, MAX_NAME_LEN, MAX_SALE_ITEMS, MAX_TEXT_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and checks it is non-blank and at most `max` characters.
///
/// ## Example
/// ```rust
/// use kiosco_core::validation::required_text;
///
/// assert_eq!(required_text("  Marta ", "admin_name", 80).unwrap(), "Marta");
/// assert!(required_text("   ", "admin_name", 80).is_err());
/// ```
pub fn required_text(value: &str, field: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Like [`required_text`] but blank input is `None` instead of an error.
pub fn optional_text(
    value: Option<&str>,
    field: &str,
    max: usize,
) -> ValidationResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required_text(v, field, max).map(Some),
        None => Ok(None),
    }
}

/// Validates the name of the administrator opening a shift.
pub fn validate_admin_name(name: &str) -> ValidationResult<String> {
    required_text(name, "admin_name", MAX_NAME_LEN)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount that may be zero but not negative.
///
/// ## Example
/// ```rust
/// use kiosco_core::money::Money;
/// use kiosco_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative(Money::zero(), "initial_cash").is_ok());
/// assert!(validate_non_negative(Money::from_cents(-1), "initial_cash").is_err());
/// ```
pub fn validate_non_negative(amount: Money, field: &str) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    validate_amount_limit(amount, field)
}

/// Validates an amount that must be strictly positive.
pub fn validate_positive(amount: Money, field: &str) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    validate_amount_limit(amount, field)
}

/// Rejects amounts above [`MAX_AMOUNT`].
pub fn validate_amount_limit(amount: Money, field: &str) -> ValidationResult<()> {
    if amount > MAX_AMOUNT {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the line items of a checkout.
///
/// ## Rules
/// - At most MAX_SALE_ITEMS lines
/// - Every quantity passes [`validate_quantity`]
/// - No negative unit price (catalog or custom)
/// - Every subtotal equals unit price × quantity
///
/// An empty list is NOT rejected here; the shift ledger reports it as
/// `CoreError::EmptySale`.
pub fn validate_sale_items(items: &[SaleItem]) -> ValidationResult<()> {
    if items.len() > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    for item in items {
        validate_quantity(item.quantity)?;
        validate_non_negative(item.unit_price(), "price")?;
        if item.subtotal != item.unit_price().multiply_quantity(item.quantity) {
            return Err(ValidationError::InvalidFormat {
                field: "subtotal".to_string(),
                reason: format!("{} does not match price × quantity", item.product.name),
            });
        }
    }

    Ok(())
}

/// Validates a free-text note field such as a withdrawal justification.
pub fn validate_note(note: &str, field: &str) -> ValidationResult<String> {
    required_text(note, field, MAX_TEXT_LEN)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductSnapshot;

    fn item(qty: i64, price: i64) -> SaleItem {
        SaleItem::new(
            ProductSnapshot {
                id: "p".to_string(),
                name: "Alfajor".to_string(),
                category: "Golosinas".to_string(),
                price: Money::from_cents(price),
            },
            qty,
            None,
        )
    }

    #[test]
    fn test_required_text() {
        assert_eq!(validate_admin_name(" Carlos ").unwrap(), "Carlos");
        assert!(validate_admin_name("").is_err());
        assert!(validate_admin_name(&"A".repeat(200)).is_err());
        assert!(matches!(
            validate_note("  ", "note"),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None, "lot_number", 20).unwrap(), None);
        assert_eq!(optional_text(Some("  "), "lot_number", 20).unwrap(), None);
        assert_eq!(
            optional_text(Some(" 12B "), "lot_number", 20).unwrap(),
            Some("12B".to_string())
        );
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_positive(Money::from_cents(1), "amount").is_ok());
        assert!(validate_positive(Money::zero(), "amount").is_err());
        assert!(validate_non_negative(Money::zero(), "amount").is_ok());
    }

    #[test]
    fn test_amounts_above_limit_are_rejected() {
        assert!(validate_non_negative(MAX_AMOUNT, "initial_cash").is_ok());
        assert!(matches!(
            validate_non_negative(Money::from_cents(9_000_000_000_000_000_000), "initial_cash"),
            Err(ValidationError::TooLarge { .. })
        ));
        assert!(validate_positive(MAX_AMOUNT + Money::from_cents(1), "amount").is_err());

        // Overflowing line saturates and is caught instead of panicking
        let mut huge = item(999, 15_000);
        huge.custom_price = Some(Money::from_cents(i64::MAX / 2));
        huge.subtotal = huge.unit_price().multiply_quantity(999);
        assert!(matches!(
            validate_sale_items(&[huge]),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_sale_items() {
        assert!(validate_sale_items(&[item(2, 15_000)]).is_ok());
        assert!(validate_sale_items(&[]).is_ok());
        assert!(validate_sale_items(&[item(0, 15_000)]).is_err());
        assert!(validate_sale_items(&[item(1, -5)]).is_err());

        let mut tampered = item(2, 15_000);
        tampered.subtotal = Money::from_cents(1);
        assert!(validate_sale_items(&[tampered]).is_err());
    }
}
