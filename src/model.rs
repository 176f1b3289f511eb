use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

// ==========================================
// Open-ended labels
// ==========================================

/// Lifecycle status of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgreementStatus {
    Draft,
    Active,
    Suspended,
    Terminated,
    Other(String),
}

impl AgreementStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "draft" => Self::Draft,
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            "terminated" => Self::Terminated,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
            Self::Other(label) => label,
        }
    }
}

/// Kind of a billable line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChargeKind {
    Recurring,
    OneTime,
    Usage,
    Credit,
    Penalty,
    Other(String),
}

impl ChargeKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "recurring" => Self::Recurring,
            "one-time" | "onetime" | "one_time" => Self::OneTime,
            "usage" => Self::Usage,
            "credit" => Self::Credit,
            "penalty" => Self::Penalty,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Recurring => "recurring",
            Self::OneTime => "one-time",
            Self::Usage => "usage",
            Self::Credit => "credit",
            Self::Penalty => "penalty",
            Self::Other(label) => label,
        }
    }
}

/// Lifecycle state of an issued bill.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BillState {
    Issued,
    Settled,
    Other(String),
}

impl BillState {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "issued" => Self::Issued,
            "settled" => Self::Settled,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Issued => "issued",
            Self::Settled => "settled",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ChargeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AgreementStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for ChargeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for BillState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ==========================================
// Periods & references
// ==========================================

/// Effective period of an agreement. `end` is absent for open-ended agreements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePeriod {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// A calendar date range used for validity windows and billing periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatePeriod {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementSpecification {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub valid_for: Option<DatePeriod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyRef {
    pub id: String,
    pub role: String,
    pub name: String,
}

/// Which of the two party sequences a party reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Engaged,
    Related,
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engaged => f.write_str("engaged"),
            Self::Related => f.write_str("related"),
        }
    }
}

// ==========================================
// Characteristics
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Scalar(Scalar),
    Boolean(bool),
    Sequence(Vec<Scalar>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Characteristic {
    pub name: String,
    pub value: CharacteristicValue,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{}", number.normalize()),
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Boolean(true) => f.write_str("yes"),
            Self::Boolean(false) => f.write_str("no"),
            Self::Sequence(values) => {
                let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(", "))
            }
        }
    }
}

// ==========================================
// Agreement content
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRef {
    pub offering: Option<EntityRef>,
    pub specification: Option<EntityRef>,
    pub characteristics: Vec<Characteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub product: ProductRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub valid_for: Option<DatePeriod>,
    pub characteristics: Vec<Characteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub last_modified: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerContact {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub at: DateTime<Utc>,
    pub event: String,
    pub actor: String,
}

// ==========================================
// Billing
// ==========================================

/// A single billable line item. Its line amount is always derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: String,
    pub kind: ChargeKind,
    pub name: String,
    pub reference: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub number: String,
    pub bill_date: NaiveDate,
    pub state: BillState,
    pub billing_period: Option<DatePeriod>,
    pub amount_due: Decimal,
    pub currency: String,
    pub payment_due: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub bill_ref: String,
}

impl Payment {
    /// Payments reference a bill by its number; the bill id is accepted as well.
    pub fn settles(&self, bill: &Bill) -> bool {
        self.bill_ref == bill.number || self.bill_ref == bill.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRecord {
    pub currency: String,
    /// Conventionally within 0..=100.
    pub tax_percent: Decimal,
    pub period: Option<DatePeriod>,
    pub charges: Vec<Charge>,
    pub bills: Vec<Bill>,
    pub payments: Vec<Payment>,
}

impl BillingRecord {
    pub fn bill(&self, number_or_id: &str) -> Option<&Bill> {
        self.bills.iter().find(|b| b.number == number_or_id || b.id == number_or_id)
    }

    pub fn payments_for<'a>(&'a self, bill: &'a Bill) -> impl Iterator<Item = &'a Payment> + 'a {
        self.payments.iter().filter(move |p| p.settles(bill))
    }
}

// ==========================================
// Agreement
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub id: String,
    pub href: Option<String>,
    pub name: String,
    pub status: AgreementStatus,
    pub effective_period: EffectivePeriod,
    pub specification: Option<AgreementSpecification>,
    pub engaged_parties: Vec<PartyRef>,
    pub related_parties: Vec<PartyRef>,
    pub items: Vec<AgreementItem>,
    pub terms: Vec<Term>,
    pub attachments: Vec<Attachment>,
    pub characteristics: Vec<Characteristic>,
    pub customer: Option<CustomerContact>,
    pub provider: Option<String>,
    pub history: Vec<HistoryEvent>,
    pub billing: BillingRecord,
}

impl Agreement {
    pub fn billing(&self) -> &BillingRecord {
        &self.billing
    }

    pub fn item(&self, id: &str) -> Option<&AgreementItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Engaged parties first, then related ones, each tagged with its sequence.
    pub fn parties(&self) -> impl Iterator<Item = (PartyKind, &PartyRef)> {
        self.engaged_parties
            .iter()
            .map(|p| (PartyKind::Engaged, p))
            .chain(self.related_parties.iter().map(|p| (PartyKind::Related, p)))
    }

    /// Contact name if present, otherwise the engaged party acting as customer.
    pub fn customer_name(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.name.as_str()).or_else(|| {
            self.engaged_parties
                .iter()
                .find(|p| p.role.eq_ignore_ascii_case("customer"))
                .map(|p| p.name.as_str())
        })
    }

    /// Provider name if present, otherwise the engaged party acting as provider.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().or_else(|| {
            self.engaged_parties
                .iter()
                .find(|p| p.role.eq_ignore_ascii_case("provider"))
                .map(|p| p.name.as_str())
        })
    }

    pub fn characteristic(&self, name: &str) -> Option<&CharacteristicValue> {
        self.characteristics.iter().find(|c| c.name == name).map(|c| &c.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_case_insensitive_with_fallback() {
        assert_eq!(AgreementStatus::from_label("Active"), AgreementStatus::Active);
        assert_eq!(ChargeKind::from_label("oneTime"), ChargeKind::OneTime);
        assert_eq!(ChargeKind::from_label("one-time"), ChargeKind::OneTime);
        assert_eq!(BillState::from_label("SETTLED"), BillState::Settled);

        let other = AgreementStatus::from_label("pendingApproval");
        assert_eq!(other, AgreementStatus::Other("pendingApproval".to_string()));
        assert_eq!(other.as_str(), "pendingApproval");
    }

    #[test]
    fn test_characteristic_value_display() {
        let seq = CharacteristicValue::Sequence(vec![
            Scalar::Text("02023097712".into()),
            Scalar::Text("02023097713".into()),
        ]);
        assert_eq!(seq.to_string(), "02023097712, 02023097713");
        assert_eq!(CharacteristicValue::Boolean(true).to_string(), "yes");
        assert_eq!(
            CharacteristicValue::Scalar(Scalar::Number(Decimal::new(2, 0))).to_string(),
            "2"
        );
    }
}
