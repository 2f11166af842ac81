//! Adjustment calculator and invoice totals pipeline.
//!
//! All amounts are `f64` at full precision; [`round_cents`] is applied only
//! at display/serialization boundaries (PDF output, payment amounts).

use serde::{Deserialize, Serialize};

/// How an adjustment value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    /// Fixed currency amount, applied as-is.
    Amount,
    /// Percentage of the base amount.
    Percentage,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Amount => "amount",
            AdjustmentKind::Percentage => "percentage",
        }
    }

    pub fn from_str_or_amount(s: &str) -> Self {
        match s {
            "percentage" => AdjustmentKind::Percentage,
            _ => AdjustmentKind::Amount,
        }
    }
}

/// A discount, tax, or shipping adjustment on an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub value: f64,
    pub kind: AdjustmentKind,
}

impl Adjustment {
    pub fn amount(value: f64) -> Self {
        Self {
            value,
            kind: AdjustmentKind::Amount,
        }
    }

    pub fn percentage(value: f64) -> Self {
        Self {
            value,
            kind: AdjustmentKind::Percentage,
        }
    }

    /// Zero-valued fixed adjustment (has no effect on any base).
    pub fn zero() -> Self {
        Self::amount(0.0)
    }

    /// Resolve the adjustment against a base amount.
    pub fn apply(&self, base: f64) -> f64 {
        match self.kind {
            AdjustmentKind::Amount => self.value,
            AdjustmentKind::Percentage => base * self.value / 100.0,
        }
    }
}

/// Computed financial breakdown of an invoice.
///
/// Invariant: `total = subtotal - discount + tax + shipping`. Tax is based on
/// the post-discount subtotal; shipping on the raw subtotal. The asymmetric
/// bases are a fixed business rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
}

impl InvoiceTotals {
    /// Run the totals pipeline over `(quantity, rate)` line items.
    pub fn compute(
        items: impl IntoIterator<Item = (f64, f64)>,
        discount: Adjustment,
        tax: Adjustment,
        shipping: Adjustment,
    ) -> Self {
        let subtotal: f64 = items.into_iter().map(|(qty, rate)| qty * rate).sum();
        let discount = discount.apply(subtotal);
        let tax = tax.apply(subtotal - discount);
        let shipping = shipping.apply(subtotal);
        Self {
            subtotal,
            discount,
            tax,
            shipping,
            total: subtotal - discount + tax + shipping,
        }
    }

    /// Copy of `self` with every field rounded to cents, for display.
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: round_cents(self.subtotal),
            discount: round_cents(self.discount),
            tax: round_cents(self.tax),
            shipping: round_cents(self.shipping),
            total: round_cents(self.total),
        }
    }
}

/// Round to two decimal places.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Whole minor units (cents) for payment APIs.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_adjustment_ignores_base() {
        let adj = Adjustment::amount(25.0);
        assert_eq!(adj.apply(0.0), 25.0);
        assert_eq!(adj.apply(100.0), 25.0);
        assert_eq!(adj.apply(9999.0), 25.0);
    }

    #[test]
    fn percentage_adjustment_scales_with_base() {
        let adj = Adjustment::percentage(10.0);
        assert_eq!(adj.apply(200.0), 20.0);
        assert_eq!(adj.apply(0.0), 0.0);
    }

    #[test]
    fn totals_pipeline_example() {
        // items [2 x 50, 1 x 30], discount 10%, tax 5%, shipping fixed 10
        let totals = InvoiceTotals::compute(
            [(2.0, 50.0), (1.0, 30.0)],
            Adjustment::percentage(10.0),
            Adjustment::percentage(5.0),
            Adjustment::amount(10.0),
        );

        assert_eq!(totals.subtotal, 130.0);
        assert_eq!(totals.discount, 13.0);
        assert!((totals.tax - 5.85).abs() < 1e-9);
        assert_eq!(totals.shipping, 10.0);
        assert!((totals.total - 132.85).abs() < 1e-9);
    }

    #[test]
    fn tax_base_is_post_discount_shipping_base_is_raw() {
        let totals = InvoiceTotals::compute(
            [(1.0, 100.0)],
            Adjustment::amount(50.0),
            Adjustment::percentage(10.0),
            Adjustment::percentage(10.0),
        );

        // tax: 10% of (100 - 50); shipping: 10% of 100
        assert_eq!(totals.tax, 5.0);
        assert_eq!(totals.shipping, 10.0);
        assert_eq!(totals.total, 100.0 - 50.0 + 5.0 + 10.0);
    }

    #[test]
    fn empty_invoice_totals_to_zero() {
        let totals = InvoiceTotals::compute(
            std::iter::empty(),
            Adjustment::zero(),
            Adjustment::zero(),
            Adjustment::zero(),
        );
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn invariant_holds() {
        let totals = InvoiceTotals::compute(
            [(3.0, 19.99), (2.5, 40.0)],
            Adjustment::percentage(12.5),
            Adjustment::percentage(8.25),
            Adjustment::amount(7.5),
        );
        let expected = totals.subtotal - totals.discount + totals.tax + totals.shipping;
        assert!((totals.total - expected).abs() < 1e-9);
    }

    #[test]
    fn rounding_only_at_display() {
        assert_eq!(round_cents(5.849999), 5.85);
        assert_eq!(round_cents(5.844), 5.84);
        assert_eq!(to_minor_units(132.85), 13285);
    }
}
