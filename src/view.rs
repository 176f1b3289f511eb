use std::fmt::{self, Write as _};

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use rust_decimal::Decimal;

use crate::billing::{MONEY_SCALE, line_amount, open_amount, round_money};
use crate::error::InvalidInputError;
use crate::model::{Agreement, AgreementStatus, BillState, ChargeKind, Characteristic, DatePeriod};

const PLACEHOLDER: &str = "—";

const RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const YELLOW: Color = Color::Rgb { r: 161, g: 98, b: 7 };

/// One block of the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Section {
    Header,
    Items,
    Billing,
    Parties,
    Terms,
    Attachments,
    Characteristics,
    Spec,
    History,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::Header,
        Section::Items,
        Section::Billing,
        Section::Parties,
        Section::Terms,
        Section::Attachments,
        Section::Characteristics,
        Section::Spec,
        Section::History,
    ];

    fn title(self) -> &'static str {
        match self {
            Self::Header => "Agreement",
            Self::Items => "Items",
            Self::Billing => "Charges & Billing",
            Self::Parties => "Parties",
            Self::Terms => "Terms",
            Self::Attachments => "Documents",
            Self::Characteristics => "Characteristics",
            Self::Spec => "Specification",
            Self::History => "History",
        }
    }
}

// ==========================================
// Formatting helpers
// ==========================================

/// Two decimals, half away from zero, followed by the currency code.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    let mut rounded = round_money(amount);
    rounded.rescale(MONEY_SCALE);
    format!("{rounded} {currency}")
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    format_date(ts.map(|t| t.date_naive()))
}

pub fn format_period(period: Option<&DatePeriod>) -> String {
    match period {
        Some(p) => format!("{} – {}", format_date(Some(p.start)), format_date(p.end)),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn charge_kind_label(kind: &ChargeKind) -> &str {
    match kind {
        ChargeKind::Recurring => "Recurring",
        ChargeKind::OneTime => "One-time",
        ChargeKind::Usage => "Usage",
        ChargeKind::Credit => "Credit",
        ChargeKind::Penalty => "Penalty",
        ChargeKind::Other(label) => label,
    }
}

fn or_placeholder(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(PLACEHOLDER)
}

fn status_cell(status: &AgreementStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        AgreementStatus::Active => cell.fg(GREEN),
        AgreementStatus::Draft => cell.fg(YELLOW),
        AgreementStatus::Suspended => cell.fg(RED),
        _ => cell,
    }
}

fn bill_state_cell(state: &BillState) -> Cell {
    let cell = Cell::new(state.as_str());
    match state {
        BillState::Settled => cell.fg(GREEN),
        BillState::Issued => cell.fg(YELLOW),
        BillState::Other(_) => cell,
    }
}

fn money_cell(amount: Decimal, currency: &str) -> Cell {
    let cell = Cell::new(format_money(amount, currency)).set_alignment(CellAlignment::Right);
    if amount < Decimal::ZERO { cell.fg(RED) } else { cell }
}

fn chips(characteristics: &[Characteristic]) -> String {
    characteristics
        .iter()
        .map(|c| format!("{}: {}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("\n")
}

// ==========================================
// Entry list
// ==========================================

/// Picker entry for interactive selection; keeps the agreement it was built from.
pub struct AgreementChoice<'a>(pub &'a Agreement);

impl fmt::Display for AgreementChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} [{}]", self.0.id, self.0.name, self.0.status)
    }
}

pub fn render_entry_list(agreements: &[&Agreement]) -> Result<Table, InvalidInputError> {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Agreement"),
        Cell::new("Status"),
        Cell::new("Term"),
        Cell::new("Products"),
        Cell::new("Monthly (net)"),
    ]);

    for agreement in agreements {
        let totals = agreement.billing.totals()?;
        let products: Vec<&str> = agreement.items.iter().map(|i| i.name.as_str()).collect();
        table.add_row(vec![
            Cell::new(format!("{}\n{}", agreement.name, agreement.id)),
            status_cell(&agreement.status),
            Cell::new(format!(
                "{} – {}",
                format_timestamp(Some(agreement.effective_period.start)),
                format_timestamp(agreement.effective_period.end)
            )),
            Cell::new(products.join(" • ")),
            money_cell(totals.net, &agreement.billing.currency),
        ]);
    }
    Ok(table)
}

// ==========================================
// Detail view
// ==========================================

/// Render all sections, or only `only` when given.
pub fn render_detail(agreement: &Agreement, only: Option<Section>) -> Result<String, InvalidInputError> {
    let sections: Vec<Section> = match only {
        Some(section) => vec![section],
        None => Section::ALL.to_vec(),
    };

    let mut out = String::new();
    for section in sections {
        let _ = writeln!(out, "\n--- {} ---", section.title());
        render_section(agreement, section, &mut out)?;
    }
    Ok(out)
}

fn render_section(agreement: &Agreement, section: Section, out: &mut String) -> Result<(), InvalidInputError> {
    let mut table = Table::new();
    match section {
        Section::Billing => return render_billing(agreement, out),
        Section::Header => {
            let customer = agreement.customer.as_ref();
            table.set_header(vec!["Field", "Value"]);
            table.add_row(vec![Cell::new("Agreement"), Cell::new(&agreement.id)]);
            table.add_row(vec![Cell::new("Name"), Cell::new(&agreement.name)]);
            table.add_row(vec![
                Cell::new("Term"),
                Cell::new(format!(
                    "{} – {}",
                    format_timestamp(Some(agreement.effective_period.start)),
                    format_timestamp(agreement.effective_period.end)
                )),
            ]);
            table.add_row(vec![Cell::new("Customer"), Cell::new(or_placeholder(agreement.customer_name()))]);
            table.add_row(vec![Cell::new("Status"), status_cell(&agreement.status)]);
            table.add_row(vec![
                Cell::new("Address"),
                Cell::new(or_placeholder(customer.and_then(|c| c.address.as_deref()))),
            ]);
            table.add_row(vec![
                Cell::new("Phone"),
                Cell::new(or_placeholder(customer.and_then(|c| c.phone.as_deref()))),
            ]);
            table.add_row(vec![Cell::new("Provider"), Cell::new(or_placeholder(agreement.provider_name()))]);
        }
        Section::Items => {
            table.set_header(vec!["Item", "Name", "Description", "Characteristics"]);
            for item in &agreement.items {
                table.add_row(vec![
                    Cell::new(&item.id),
                    Cell::new(&item.name),
                    Cell::new(or_placeholder(item.description.as_deref())),
                    Cell::new(chips(&item.product.characteristics)),
                ]);
            }
        }
        Section::Parties => {
            table.set_header(vec!["Role", "Name", "Type"]);
            for (kind, party) in agreement.parties() {
                table.add_row(vec![Cell::new(&party.role), Cell::new(&party.name), Cell::new(kind)]);
            }
        }
        Section::Terms => {
            table.set_header(vec!["Term", "Description", "Valid"]);
            for term in &agreement.terms {
                table.add_row(vec![
                    Cell::new(&term.name),
                    Cell::new(or_placeholder(term.description.as_deref())),
                    Cell::new(format_period(term.valid_for.as_ref())),
                ]);
            }
        }
        Section::Attachments => {
            table.set_header(vec!["File", "Type", "Modified", "Location"]);
            for attachment in &agreement.attachments {
                table.add_row(vec![
                    Cell::new(&attachment.name),
                    Cell::new(or_placeholder(attachment.mime_type.as_deref())),
                    Cell::new(format_date(attachment.last_modified)),
                    Cell::new(&attachment.url),
                ]);
            }
        }
        Section::Characteristics => {
            table.set_header(vec!["Name", "Value"]);
            for c in &agreement.characteristics {
                table.add_row(vec![Cell::new(&c.name), Cell::new(&c.value)]);
            }
        }
        Section::Spec => {
            table.set_header(vec!["Template", "Version", "Valid", "Spec-ID"]);
            if let Some(spec) = &agreement.specification {
                table.add_row(vec![
                    Cell::new(&spec.name),
                    Cell::new(or_placeholder(spec.version.as_deref())),
                    Cell::new(format_period(spec.valid_for.as_ref())),
                    Cell::new(&spec.id),
                ]);
            }
        }
        Section::History => {
            table.set_header(vec!["Time", "Event", "User/System"]);
            for event in &agreement.history {
                table.add_row(vec![
                    Cell::new(event.at.format("%Y-%m-%d %H:%M")),
                    Cell::new(&event.event),
                    Cell::new(&event.actor),
                ]);
            }
        }
    }
    let _ = writeln!(out, "{table}");
    Ok(())
}

fn render_billing(agreement: &Agreement, out: &mut String) -> Result<(), InvalidInputError> {
    let billing = &agreement.billing;
    let currency = billing.currency.as_str();
    let totals = billing.totals()?;

    let _ = writeln!(out, "Billing period: {}", format_period(billing.period.as_ref()));

    let mut charges = Table::new();
    charges.set_header(vec!["Position", "Kind", "Reference", "Qty", "Unit", "Unit price", "Amount"]);
    for charge in &billing.charges {
        charges.add_row(vec![
            Cell::new(&charge.name),
            Cell::new(charge_kind_label(&charge.kind)),
            Cell::new(&charge.reference),
            Cell::new(charge.quantity.normalize()).set_alignment(CellAlignment::Right),
            Cell::new(&charge.unit),
            money_cell(charge.unit_price, currency),
            money_cell(line_amount(charge)?, currency),
        ]);
    }
    charges.add_row(vec![
        Cell::new("Subtotal (net)").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        money_cell(totals.net, currency).add_attribute(Attribute::Bold),
    ]);
    charges.add_row(vec![
        Cell::new(format!("Tax ({}%)", billing.tax_percent.normalize())),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        money_cell(totals.tax, currency),
    ]);
    charges.add_row(vec![
        Cell::new("Total (gross)").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        money_cell(totals.gross, currency).add_attribute(Attribute::Bold),
    ]);
    let _ = writeln!(out, "{charges}");

    let mut bills = Table::new();
    bills.set_header(vec!["Bill no.", "Period", "Date", "State", "Due by", "Amount due", "Open"]);
    for bill in &billing.bills {
        let open = open_amount(billing, bill)?;
        bills.add_row(vec![
            Cell::new(&bill.number),
            Cell::new(format_period(bill.billing_period.as_ref())),
            Cell::new(format_date(Some(bill.bill_date))),
            bill_state_cell(&bill.state),
            Cell::new(format_date(bill.payment_due)),
            money_cell(bill.amount_due, &bill.currency),
            money_cell(open, &bill.currency),
        ]);
    }
    let _ = writeln!(out, "\nBills\n{bills}");

    let mut payments = Table::new();
    payments.set_header(vec!["Payment date", "Method", "Bill", "Amount"]);
    for payment in &billing.payments {
        payments.add_row(vec![
            Cell::new(format_date(Some(payment.date))),
            Cell::new(or_placeholder(Some(payment.method.as_str()))),
            Cell::new(&payment.bill_ref),
            money_cell(payment.amount, &payment.currency),
        ]);
    }
    let _ = writeln!(out, "\nPayments\n{payments}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AgreementCatalog;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_format_money_rounds_half_away_from_zero() {
        assert_eq!(format_money(d("110.8"), "EUR"), "110.80 EUR");
        assert_eq!(format_money(d("0.005"), "EUR"), "0.01 EUR");
        assert_eq!(format_money(d("-0.005"), "EUR"), "-0.01 EUR");
        assert_eq!(format_money(d("7"), "USD"), "7.00 USD");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(format_date(None), "—");
        assert_eq!(format_period(None), "—");
        assert_eq!(or_placeholder(Some("")), "—");
    }

    #[test]
    fn test_choice_keeps_agreement_with_separator_in_id() {
        let catalog = AgreementCatalog::sample().unwrap();
        let mut agreement = catalog.get("AGR-2024-000777").unwrap().clone();
        agreement.id = "AGR | 7".to_string();

        let choice = AgreementChoice(&agreement);
        assert_eq!(choice.to_string(), "AGR | 7 | Office Fast Secure+ – Zusatzstandort [suspended]");
        assert_eq!(choice.0.id, "AGR | 7");
    }

    #[test]
    fn test_entry_list_shows_net_per_agreement() {
        let catalog = AgreementCatalog::sample().unwrap();
        let all: Vec<&Agreement> = catalog.iter().collect();
        let rendered = render_entry_list(&all).unwrap().to_string();
        assert!(rendered.contains("110.80 EUR"));
        assert!(rendered.contains("39.90 EUR"));
        assert!(rendered.contains("Office Fast Secure+ (Internet) • Voice"));
    }

    #[test]
    fn test_billing_section_lists_lines_and_totals() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2025-000123").unwrap();
        let rendered = render_detail(agreement, Some(Section::Billing)).unwrap();
        assert!(rendered.contains("6.00 EUR"));
        assert!(rendered.contains("-10.00 EUR"));
        assert!(rendered.contains("21.05 EUR"));
        assert!(rendered.contains("131.85 EUR"));
        assert!(rendered.contains("Tax (19%)"));
        assert!(!rendered.contains("--- Items ---"));
    }

    #[test]
    fn test_full_detail_has_every_section() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2025-000123").unwrap();
        let rendered = render_detail(agreement, None).unwrap();
        for section in Section::ALL {
            assert!(rendered.contains(&format!("--- {} ---", section.title())));
        }
        assert!(rendered.contains("02023097712, 02023097713, 02023097714"));
        assert!(rendered.contains("Erika Beispiel"));
        assert!(rendered.contains("AGRSPEC-B2B-ACCESS-VOICE"));
    }
}
