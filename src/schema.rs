//! Validating construction of [`Agreement`]s from loosely typed JSON records.
//!
//! Field names follow the mockup data (`effectivePeriod.startDateTime`, `billing.taxPercent`, ...).
//! Errors name the offending field by path, e.g. `billing.charges[2].quantity`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::error::SchemaError;
use crate::model::{
    Agreement, AgreementItem, AgreementSpecification, AgreementStatus, Attachment, Bill, BillState,
    BillingRecord, Charge, ChargeKind, Characteristic, CharacteristicValue, CustomerContact,
    DatePeriod, EffectivePeriod, EntityRef, HistoryEvent, PartyRef, Payment, ProductRef, Scalar,
    Term,
};

type SchemaResult<T> = Result<T, SchemaError>;

/// Build an [`Agreement`] from a raw record, failing on the first missing or malformed field.
pub fn parse_agreement(raw: &Value) -> SchemaResult<Agreement> {
    let record = Record::root(raw)?;

    let id = record.str(&["id"])?;
    let name = record.str(&["name"])?;
    let status = AgreementStatus::from_label(&record.str(&["status"])?);
    let period = record
        .opt_object(&["effectivePeriod"])?
        .ok_or_else(|| SchemaError::missing("effectivePeriod.start"))?;
    let effective_period = parse_effective_period(&period)?;
    let billing = parse_billing(&record.object(&["billing"])?)?;

    let specification = record
        .opt_object(&["agreementSpecification", "specification"])?
        .map(|r| parse_specification(&r))
        .transpose()?;
    let engaged_parties = record.list(&["engagedParty", "engagedParties"], parse_party)?;
    let related_parties = record.list(&["relatedParty", "relatedParties"], parse_party)?;
    let items = record.list(&["agreementItem", "items"], parse_item)?;
    let terms = record.list(&["terms", "term"], parse_term)?;
    let attachments = record.list(&["attachment", "attachments"], parse_attachment)?;
    let characteristics = record.list(&["characteristic", "characteristics"], parse_characteristic)?;
    let customer = record.opt_object(&["customer"])?.map(|r| parse_customer(&r)).transpose()?;
    let provider = record.opt_str(&["provider"])?;
    let history = record.list(&["history"], parse_history_event)?;

    debug!(
        "parsed agreement {} ({} items, {} charges)",
        id,
        items.len(),
        billing.charges.len()
    );

    Ok(Agreement {
        id,
        href: record.opt_str(&["href"])?,
        name,
        status,
        effective_period,
        specification,
        engaged_parties,
        related_parties,
        items,
        terms,
        attachments,
        characteristics,
        customer,
        provider,
        history,
        billing,
    })
}

// ==========================================
// Entity parsers
// ==========================================

fn parse_effective_period(record: &Record<'_>) -> SchemaResult<EffectivePeriod> {
    let start = record.datetime(&["start", "startDateTime"])?;
    let end = record.opt_datetime(&["end", "endDateTime"])?;
    if let Some(end) = end {
        if end < start {
            return Err(SchemaError::new(
                record.path_of("end"),
                "must not be earlier than the start",
            ));
        }
    }
    Ok(EffectivePeriod { start, end })
}

fn parse_date_period(record: &Record<'_>) -> SchemaResult<DatePeriod> {
    let start = record.date(&["start", "startDate"])?;
    let end = record.opt_date(&["end", "endDate"])?;
    if let Some(end) = end {
        if end < start {
            return Err(SchemaError::new(
                record.path_of("end"),
                "must not be earlier than the start",
            ));
        }
    }
    Ok(DatePeriod { start, end })
}

fn parse_billing(record: &Record<'_>) -> SchemaResult<BillingRecord> {
    let currency = record.str(&["currency"])?;
    let tax_percent = record.decimal(&["taxPercent"])?;
    if tax_percent < Decimal::ZERO || tax_percent > Decimal::ONE_HUNDRED {
        return Err(SchemaError::new(
            record.path_of("taxPercent"),
            format!("{tax_percent} is outside 0..=100"),
        ));
    }
    let period = record.opt_object(&["period"])?.map(|r| parse_date_period(&r)).transpose()?;
    let charges = record.list(&["charges"], parse_charge)?;
    let bills = record.list(&["bills"], |r| parse_bill(r, &currency))?;
    let payments = record.list(&["payments"], |r| parse_payment(r, &currency))?;

    Ok(BillingRecord { currency, tax_percent, period, charges, bills, payments })
}

fn parse_charge(record: Record<'_>) -> SchemaResult<Charge> {
    Ok(Charge {
        id: record.str(&["id"])?,
        kind: ChargeKind::from_label(&record.str(&["kind", "type"])?),
        name: record.str(&["name"])?,
        reference: record.opt_str(&["reference"])?.unwrap_or_default(),
        quantity: record.decimal(&["quantity"])?,
        unit: record.opt_str(&["unit"])?.unwrap_or_default(),
        unit_price: record.decimal(&["unitPrice"])?,
    })
}

fn parse_bill(record: Record<'_>, default_currency: &str) -> SchemaResult<Bill> {
    Ok(Bill {
        id: record.str(&["id"])?,
        number: record.str(&["billNo", "number"])?,
        bill_date: record.date(&["billDate"])?,
        state: BillState::from_label(&record.str(&["state"])?),
        billing_period: record
            .opt_object(&["billingPeriod"])?
            .map(|r| parse_date_period(&r))
            .transpose()?,
        amount_due: record.decimal(&["amountDue"])?,
        currency: record.opt_str(&["currency"])?.unwrap_or_else(|| default_currency.to_string()),
        payment_due: record.opt_date(&["paymentDueDate"])?,
    })
}

fn parse_payment(record: Record<'_>, default_currency: &str) -> SchemaResult<Payment> {
    Ok(Payment {
        id: record.str(&["id"])?,
        date: record.date(&["date"])?,
        amount: record.decimal(&["amount"])?,
        currency: record.opt_str(&["currency"])?.unwrap_or_else(|| default_currency.to_string()),
        method: record.opt_str(&["method"])?.unwrap_or_default(),
        bill_ref: record.str(&["billRef"])?,
    })
}

fn parse_specification(record: &Record<'_>) -> SchemaResult<AgreementSpecification> {
    Ok(AgreementSpecification {
        id: record.str(&["id"])?,
        name: record.str(&["name"])?,
        version: record.opt_str(&["version"])?,
        valid_for: record.opt_object(&["validFor"])?.map(|r| parse_date_period(&r)).transpose()?,
    })
}

fn parse_party(record: Record<'_>) -> SchemaResult<PartyRef> {
    Ok(PartyRef {
        id: record.str(&["id"])?,
        role: record.str(&["role"])?,
        name: record.opt_str(&["name"])?.unwrap_or_default(),
    })
}

fn parse_entity_ref(record: &Record<'_>) -> SchemaResult<EntityRef> {
    Ok(EntityRef { id: record.str(&["id"])?, name: record.opt_str(&["name"])? })
}

fn parse_item(record: Record<'_>) -> SchemaResult<AgreementItem> {
    let product = match record.opt_object(&["product"])? {
        Some(product) => ProductRef {
            offering: product
                .opt_object(&["productOffering"])?
                .map(|r| parse_entity_ref(&r))
                .transpose()?,
            specification: product
                .opt_object(&["productSpecification"])?
                .map(|r| parse_entity_ref(&r))
                .transpose()?,
            characteristics: product.list(&["productCharacteristic"], parse_characteristic)?,
        },
        None => ProductRef { offering: None, specification: None, characteristics: Vec::new() },
    };

    Ok(AgreementItem {
        id: record.str(&["id"])?,
        name: record.str(&["name"])?,
        description: record.opt_str(&["description"])?,
        product,
    })
}

fn parse_term(record: Record<'_>) -> SchemaResult<Term> {
    Ok(Term {
        id: record.str(&["id"])?,
        name: record.str(&["name"])?,
        description: record.opt_str(&["description"])?,
        valid_for: record.opt_object(&["validFor"])?.map(|r| parse_date_period(&r)).transpose()?,
        characteristics: record.list(&["characteristic", "characteristics"], parse_characteristic)?,
    })
}

fn parse_attachment(record: Record<'_>) -> SchemaResult<Attachment> {
    Ok(Attachment {
        id: record.str(&["id"])?,
        name: record.str(&["name"])?,
        url: record.str(&["url"])?,
        mime_type: record.opt_str(&["mimeType"])?,
        last_modified: record.opt_date(&["lastModified"])?,
    })
}

fn parse_characteristic(record: Record<'_>) -> SchemaResult<Characteristic> {
    let name = record.str(&["name"])?;
    let path = record.path_of("value");
    let value = match record.get(&["value"]) {
        None => return Err(SchemaError::missing(path)),
        Some(Value::Bool(flag)) => CharacteristicValue::Boolean(*flag),
        Some(Value::Array(values)) => CharacteristicValue::Sequence(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| parse_scalar(v, &format!("{path}[{i}]")))
                .collect::<SchemaResult<_>>()?,
        ),
        Some(other) => CharacteristicValue::Scalar(parse_scalar(other, &path)?),
    };
    Ok(Characteristic { name, value })
}

fn parse_scalar(value: &Value, path: &str) -> SchemaResult<Scalar> {
    match value {
        Value::String(text) => Ok(Scalar::Text(text.clone())),
        Value::Number(number) => decimal_from_number(number)
            .map(Scalar::Number)
            .ok_or_else(|| SchemaError::new(path, format!("{number} is not a representable number"))),
        _ => Err(SchemaError::new(path, "expected a string or a number")),
    }
}

fn parse_customer(record: &Record<'_>) -> SchemaResult<CustomerContact> {
    Ok(CustomerContact {
        name: record.str(&["name"])?,
        phone: record.opt_str(&["phone"])?,
        address: record.opt_str(&["address"])?,
    })
}

fn parse_history_event(record: Record<'_>) -> SchemaResult<HistoryEvent> {
    Ok(HistoryEvent {
        at: record.datetime(&["at", "time", "timestamp"])?,
        event: record.str(&["event"])?,
        actor: record.opt_str(&["actor", "user"])?.unwrap_or_else(|| "system".to_string()),
    })
}

// ==========================================
// Scalar conversions
// ==========================================

/// Exact decimal from the JSON text of a number, so `79.90` stays `79.90`.
pub(crate) fn decimal_from_number(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}

/// RFC 3339 timestamp, `YYYY-MM-DD HH:MM`, or a bare date at midnight UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

// ==========================================
// Record cursor
// ==========================================

/// A JSON object together with its path from the agreement root.
struct Record<'a> {
    fields: &'a Map<String, Value>,
    path: String,
}

impl<'a> Record<'a> {
    fn root(value: &'a Value) -> SchemaResult<Self> {
        value
            .as_object()
            .map(|fields| Self { fields, path: String::new() })
            .ok_or_else(|| SchemaError::new("$", "agreement record must be an object"))
    }

    fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// First non-null value under `keys`. The first key is the canonical name used in errors.
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().filter_map(|k| self.fields.get(*k)).find(|v| !v.is_null())
    }

    fn opt_str(&self, keys: &[&str]) -> SchemaResult<Option<String>> {
        match self.get(keys) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(SchemaError::new(self.path_of(keys[0]), "expected a string")),
        }
    }

    fn str(&self, keys: &[&str]) -> SchemaResult<String> {
        let text = self.opt_str(keys)?.ok_or_else(|| SchemaError::missing(self.path_of(keys[0])))?;
        if text.trim().is_empty() {
            return Err(SchemaError::new(self.path_of(keys[0]), "must not be empty"));
        }
        Ok(text)
    }

    fn decimal(&self, keys: &[&str]) -> SchemaResult<Decimal> {
        let path = self.path_of(keys[0]);
        match self.get(keys) {
            None => Err(SchemaError::missing(path)),
            Some(Value::Number(number)) => decimal_from_number(number)
                .ok_or_else(|| SchemaError::new(path, format!("{number} is not a representable number"))),
            Some(_) => Err(SchemaError::new(path, "expected a number")),
        }
    }

    fn opt_date(&self, keys: &[&str]) -> SchemaResult<Option<NaiveDate>> {
        self.opt_str(keys)?
            .map(|text| {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
                    SchemaError::new(self.path_of(keys[0]), format!("`{text}` is not a YYYY-MM-DD date"))
                })
            })
            .transpose()
    }

    fn date(&self, keys: &[&str]) -> SchemaResult<NaiveDate> {
        self.opt_date(keys)?.ok_or_else(|| SchemaError::missing(self.path_of(keys[0])))
    }

    fn opt_datetime(&self, keys: &[&str]) -> SchemaResult<Option<DateTime<Utc>>> {
        self.opt_str(keys)?
            .map(|text| {
                parse_timestamp(&text).ok_or_else(|| {
                    SchemaError::new(self.path_of(keys[0]), format!("`{text}` is not a timestamp"))
                })
            })
            .transpose()
    }

    fn datetime(&self, keys: &[&str]) -> SchemaResult<DateTime<Utc>> {
        self.opt_datetime(keys)?.ok_or_else(|| SchemaError::missing(self.path_of(keys[0])))
    }

    fn opt_object(&self, keys: &[&str]) -> SchemaResult<Option<Record<'a>>> {
        let path = self.path_of(keys[0]);
        match self.get(keys) {
            None => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(Record { fields, path })),
            Some(_) => Err(SchemaError::new(path, "expected an object")),
        }
    }

    fn object(&self, keys: &[&str]) -> SchemaResult<Record<'a>> {
        self.opt_object(keys)?.ok_or_else(|| SchemaError::missing(self.path_of(keys[0])))
    }

    /// Ordered sequence of objects; absent means empty.
    fn list<T>(
        &self,
        keys: &[&str],
        mut parse: impl FnMut(Record<'a>) -> SchemaResult<T>,
    ) -> SchemaResult<Vec<T>> {
        let path = self.path_of(keys[0]);
        let entries = match self.get(keys) {
            None => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(SchemaError::new(path, "expected an array")),
        };

        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let entry_path = format!("{path}[{i}]");
                match entry.as_object() {
                    Some(fields) => parse(Record { fields, path: entry_path }),
                    None => Err(SchemaError::new(entry_path, "expected an object")),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "id": "AGR-1",
            "name": "Test agreement",
            "status": "active",
            "effectivePeriod": { "startDateTime": "2025-03-26T00:00:00Z" },
            "billing": { "currency": "EUR", "taxPercent": 19 }
        })
    }

    #[test]
    fn test_minimal_record_defaults_to_empty_sequences() {
        let agreement = parse_agreement(&minimal()).unwrap();
        assert_eq!(agreement.id, "AGR-1");
        assert_eq!(agreement.status, AgreementStatus::Active);
        assert!(agreement.effective_period.end.is_none());
        assert!(agreement.items.is_empty());
        assert!(agreement.engaged_parties.is_empty());
        assert!(agreement.billing.charges.is_empty());
        assert_eq!(agreement.billing.tax_percent, Decimal::new(19, 0));
    }

    #[test]
    fn test_missing_effective_period_start() {
        let mut raw = minimal();
        raw["effectivePeriod"] = json!({ "endDateTime": "2028-03-25T23:59:59Z" });
        let err = parse_agreement(&raw).unwrap_err();
        assert_eq!(err.field, "effectivePeriod.start");
    }

    #[test]
    fn test_absent_effective_period_reports_start() {
        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("effectivePeriod");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "effectivePeriod.start");

        raw["effectivePeriod"] = Value::Null;
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "effectivePeriod.start");

        raw["effectivePeriod"] = json!("2025-03-26");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "effectivePeriod");
    }

    #[test]
    fn test_required_fields_checked_in_order() {
        let err = parse_agreement(&json!({ "name": "x" })).unwrap_err();
        assert_eq!(err.field, "id");

        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("status");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "status");

        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("billing");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "billing");
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let mut raw = minimal();
        raw["effectivePeriod"]["endDateTime"] = json!("2024-01-01T00:00:00Z");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "effectivePeriod.end");
    }

    #[test]
    fn test_billing_validation() {
        let mut raw = minimal();
        raw["billing"]["taxPercent"] = json!(101);
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "billing.taxPercent");

        let mut raw = minimal();
        raw["billing"]["taxPercent"] = json!("19");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "billing.taxPercent");

        let mut raw = minimal();
        raw["billing"].as_object_mut().unwrap().remove("currency");
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "billing.currency");
    }

    #[test]
    fn test_malformed_charge_reports_indexed_path() {
        let mut raw = minimal();
        raw["billing"]["charges"] = json!([
            { "id": "CH-1", "type": "recurring", "name": "MRC", "quantity": 1, "unitPrice": 79.90 },
            { "id": "CH-2", "type": "usage", "name": "Minutes", "quantity": "lots", "unitPrice": 0.02 }
        ]);
        let err = parse_agreement(&raw).unwrap_err();
        assert_eq!(err.field, "billing.charges[1].quantity");
    }

    #[test]
    fn test_charge_numbers_are_exact() {
        let mut raw = minimal();
        raw["billing"]["charges"] = json!([
            { "id": "CH-1", "kind": "credit", "name": "Promo", "quantity": 1, "unitPrice": -10.0 },
            { "id": "CH-2", "type": "usage", "name": "Data", "quantity": 0.5, "unitPrice": 79.90 }
        ]);
        let agreement = parse_agreement(&raw).unwrap();
        let charges = &agreement.billing.charges;
        assert_eq!(charges[0].kind, ChargeKind::Credit);
        assert_eq!(charges[0].unit_price, Decimal::new(-10, 0));
        assert_eq!(charges[1].quantity, Decimal::new(5, 1));
        assert_eq!(charges[1].unit_price, Decimal::new(7990, 2));
    }

    #[test]
    fn test_characteristic_values() {
        let mut raw = minimal();
        raw["characteristic"] = json!([
            { "name": "ContractType", "value": "B2B" },
            { "name": "RouterIncluded", "value": true },
            { "name": "DDIs", "value": ["0202", "0203"] },
            { "name": "VoiceChannels", "value": 2 }
        ]);
        let agreement = parse_agreement(&raw).unwrap();
        assert_eq!(
            agreement.characteristic("RouterIncluded"),
            Some(&CharacteristicValue::Boolean(true))
        );
        assert_eq!(agreement.characteristic("DDIs").unwrap().to_string(), "0202, 0203");

        raw["characteristic"] = json!([{ "name": "Broken", "value": { "nested": 1 } }]);
        assert_eq!(parse_agreement(&raw).unwrap_err().field, "characteristic[0].value");
    }

    #[test]
    fn test_non_object_record() {
        let err = parse_agreement(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.field, "$");
    }
}
