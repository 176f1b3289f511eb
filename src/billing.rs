//! Billing aggregation: per-line amounts and net/tax/gross totals for a charge list.
//!
//! All arithmetic is exact decimal. Only `tax` and `gross` are rounded (2 places, half away from
//! zero); `net` keeps full precision and is the base for the tax computation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;

use crate::error::InvalidInputError;
use crate::model::{Bill, BillingRecord, Charge};
use crate::schema::decimal_from_number;

/// Decimal places of the rounded figures.
pub const MONEY_SCALE: u32 = 2;

/// Summary figures for a list of charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub net: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
}

impl Totals {
    pub const ZERO: Totals = Totals { net: Decimal::ZERO, tax: Decimal::ZERO, gross: Decimal::ZERO };
}

/// Round a money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity * unit_price`, unrounded.
pub fn line_amount(charge: &Charge) -> Result<Decimal, InvalidInputError> {
    multiply(charge.quantity, charge.unit_price, &charge.id)
}

/// Aggregate a charge list. Credits are negative line amounts and need no special handling.
pub fn aggregate<'a, I>(charges: I, tax_percent: Decimal) -> Result<Totals, InvalidInputError>
where
    I: IntoIterator<Item = &'a Charge>,
{
    let mut net = Decimal::ZERO;
    for charge in charges {
        net = add(net, line_amount(charge)?)?;
    }
    totals_for_net(net, tax_percent)
}

/// Aggregate a loosely typed charge list, as found in raw agreement data.
///
/// Fails if `charges` is not an array, or if an entry lacks a numeric `quantity` or `unitPrice`.
pub fn aggregate_value(charges: &Value, tax_percent: Decimal) -> Result<Totals, InvalidInputError> {
    let entries = charges
        .as_array()
        .ok_or_else(|| InvalidInputError::new("charges must be an array"))?;

    let mut net = Decimal::ZERO;
    for (index, entry) in entries.iter().enumerate() {
        let quantity = numeric_field(entry, "quantity", index)?;
        let unit_price = numeric_field(entry, "unitPrice", index)?;
        net = add(net, multiply(quantity, unit_price, &format!("charges[{index}]"))?)?;
    }
    totals_for_net(net, tax_percent)
}

/// Sum of the payments that settle `bill`.
pub fn settled_amount(record: &BillingRecord, bill: &Bill) -> Result<Decimal, InvalidInputError> {
    record.payments_for(bill).try_fold(Decimal::ZERO, |sum, p| add(sum, p.amount))
}

/// Amount still owed on a bill after the payments that reference it.
pub fn open_amount(record: &BillingRecord, bill: &Bill) -> Result<Decimal, InvalidInputError> {
    bill.amount_due
        .checked_sub(settled_amount(record, bill)?)
        .ok_or_else(|| InvalidInputError::new(format!("open amount of bill {} overflowed", bill.number)))
}

impl BillingRecord {
    pub fn totals(&self) -> Result<Totals, InvalidInputError> {
        aggregate(&self.charges, self.tax_percent)
    }
}

fn totals_for_net(net: Decimal, tax_percent: Decimal) -> Result<Totals, InvalidInputError> {
    let raw_tax = net
        .checked_mul(tax_percent)
        .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| InvalidInputError::new("tax computation overflowed"))?;
    let tax = round_money(raw_tax);
    let gross = round_money(add(net, tax)?);
    Ok(Totals { net, tax, gross })
}

fn numeric_field(entry: &Value, key: &str, index: usize) -> Result<Decimal, InvalidInputError> {
    match entry.get(key) {
        Some(Value::Number(number)) => decimal_from_number(number).ok_or_else(|| {
            InvalidInputError::new(format!("charges[{index}].{key}: {number} is not representable"))
        }),
        Some(other) => Err(InvalidInputError::new(format!(
            "charges[{index}].{key}: expected a number, got {other}"
        ))),
        None => Err(InvalidInputError::new(format!("charges[{index}].{key} is missing"))),
    }
}

fn multiply(quantity: Decimal, unit_price: Decimal, what: &str) -> Result<Decimal, InvalidInputError> {
    quantity
        .checked_mul(unit_price)
        .ok_or_else(|| InvalidInputError::new(format!("line amount of {what} overflowed")))
}

fn add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, InvalidInputError> {
    lhs.checked_add(rhs).ok_or_else(|| InvalidInputError::new("sum overflowed"))
}
