use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;
use serde::Serialize;
use slug::slugify;
use tera::{Context, Tera};

use crate::billing::{line_amount, open_amount};
use crate::error::ExportError;
use crate::model::Agreement;
use crate::view::{charge_kind_label, format_date, format_money, format_period, format_timestamp};

const TEMPLATE_NAME: &str = "agreement.tera";

// Embed template at compile time; a file of the same name in the export dir overrides it
const DEFAULT_TEMPLATE: &str = include_str!("../templates/agreement.tera");

#[derive(Serialize)]
struct CharacteristicLine {
    name: String,
    display: String,
}

#[derive(Serialize)]
struct ItemLine {
    id: String,
    name: String,
    description: Option<String>,
    characteristics: Vec<CharacteristicLine>,
}

#[derive(Serialize)]
struct ChargeLine {
    name: String,
    kind: String,
    reference: String,
    quantity: String,
    unit: String,
    unit_price: String,
    amount: String,
}

#[derive(Serialize)]
struct BillLine {
    number: String,
    date: String,
    state: String,
    due: String,
    amount_due: String,
    open: String,
}

#[derive(Serialize)]
struct PaymentLine {
    date: String,
    method: String,
    bill_ref: String,
    amount: String,
}

#[derive(Serialize)]
struct ExportContext<'a> {
    agreement: &'a Agreement,
    term: String,
    customer: String,
    provider: String,
    specification: Option<String>,
    period: String,
    items: Vec<ItemLine>,
    lines: Vec<ChargeLine>,
    bills: Vec<BillLine>,
    payments: Vec<PaymentLine>,
    tax_percent: String,
    net: String,
    tax: String,
    gross: String,
    generated: String,
}

fn build_context(agreement: &Agreement) -> Result<ExportContext<'_>, ExportError> {
    let billing = &agreement.billing;
    let currency = billing.currency.as_str();
    let totals = billing.totals()?;

    let items = agreement
        .items
        .iter()
        .map(|item| ItemLine {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            characteristics: item
                .product
                .characteristics
                .iter()
                .map(|c| CharacteristicLine { name: c.name.clone(), display: c.value.to_string() })
                .collect(),
        })
        .collect();

    let lines = billing
        .charges
        .iter()
        .map(|charge| {
            Ok(ChargeLine {
                name: charge.name.clone(),
                kind: charge_kind_label(&charge.kind).to_string(),
                reference: charge.reference.clone(),
                quantity: charge.quantity.normalize().to_string(),
                unit: charge.unit.clone(),
                unit_price: format_money(charge.unit_price, currency),
                amount: format_money(line_amount(charge)?, currency),
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    let bills = billing
        .bills
        .iter()
        .map(|bill| {
            Ok(BillLine {
                number: bill.number.clone(),
                date: format_date(Some(bill.bill_date)),
                state: bill.state.to_string(),
                due: format_date(bill.payment_due),
                amount_due: format_money(bill.amount_due, &bill.currency),
                open: format_money(open_amount(billing, bill)?, &bill.currency),
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    let payments = billing
        .payments
        .iter()
        .map(|p| PaymentLine {
            date: format_date(Some(p.date)),
            method: p.method.clone(),
            bill_ref: p.bill_ref.clone(),
            amount: format_money(p.amount, &p.currency),
        })
        .collect();

    Ok(ExportContext {
        agreement,
        term: format!(
            "{} – {}",
            format_timestamp(Some(agreement.effective_period.start)),
            format_timestamp(agreement.effective_period.end)
        ),
        customer: agreement.customer_name().unwrap_or("—").to_string(),
        provider: agreement.provider_name().unwrap_or("—").to_string(),
        specification: agreement.specification.as_ref().map(|spec| match &spec.version {
            Some(version) => format!("{} {} ({})", spec.name, version, spec.id),
            None => format!("{} ({})", spec.name, spec.id),
        }),
        period: format_period(billing.period.as_ref()),
        items,
        lines,
        bills,
        payments,
        tax_percent: billing.tax_percent.normalize().to_string(),
        net: format_money(totals.net, currency),
        tax: format_money(totals.tax, currency),
        gross: format_money(totals.gross, currency),
        generated: Local::now().format("%Y-%m-%d %H:%M").to_string(),
    })
}

/// Render the Markdown export, using `template` instead of the built-in one when given.
pub fn render_export(agreement: &Agreement, template: Option<&str>) -> Result<String, ExportError> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, template.unwrap_or(DEFAULT_TEMPLATE))?;

    let context = Context::from_serialize(build_context(agreement)?)?;
    Ok(tera.render(TEMPLATE_NAME, &context)?)
}

pub fn export_file_name(agreement: &Agreement) -> String {
    format!("{}_{}.md", agreement.id, slugify(&agreement.name))
}

/// Write the export into `export_dir` and return the written path.
pub fn export_agreement(agreement: &Agreement, export_dir: &Path) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(export_dir)?;

    let override_path = export_dir.join(TEMPLATE_NAME);
    let custom = if override_path.exists() {
        info!("Using template {}", override_path.display());
        Some(fs::read_to_string(&override_path)?)
    } else {
        None
    };

    let rendered = render_export(agreement, custom.as_deref())?;
    let path = export_dir.join(export_file_name(agreement));
    fs::write(&path, rendered)?;
    info!("Exported {} to {}", agreement.id, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AgreementCatalog;

    #[test]
    fn test_export_contains_totals_and_every_charge() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2025-000123").unwrap();
        let rendered = render_export(agreement, None).unwrap();

        assert!(rendered.starts_with("# Office Fast Secure+"));
        assert!(rendered.contains("**131.85 EUR**"));
        assert!(rendered.contains("| Tax (19%) | | | | | | 21.05 EUR |"));
        for charge in &agreement.billing.charges {
            assert!(rendered.contains(&charge.name), "missing {}", charge.name);
        }
        assert!(rendered.contains("DDIs: 02023097712, 02023097713, 02023097714"));
        assert!(rendered.contains("B2B Access + Voice 1.2 (AGRSPEC-B2B-ACCESS-VOICE)"));
    }

    #[test]
    fn test_export_shows_open_amount_per_bill() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2025-000123").unwrap();
        let rendered = render_export(agreement, None).unwrap();

        let row = |number: &str| rendered.lines().find(|l| l.starts_with(&format!("| {number} |"))).unwrap();
        assert!(row("INV-2025-09-0001").ends_with("| 129.80 EUR | 129.80 EUR |"));
        assert!(row("INV-2025-08-0001").ends_with("| 129.80 EUR | 0.00 EUR |"));
    }

    #[test]
    fn test_custom_template() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2024-000777").unwrap();
        let rendered = render_export(agreement, Some("{{ agreement.id }}: {{ gross }}")).unwrap();
        assert_eq!(rendered, "AGR-2024-000777: 47.48 EUR");
    }

    #[test]
    fn test_export_writes_slugged_file() {
        let catalog = AgreementCatalog::sample().unwrap();
        let agreement = catalog.get("AGR-2024-000777").unwrap();
        let dir = std::env::temp_dir().join(format!("agreement-viewer-export-{}", std::process::id()));

        let path = export_agreement(agreement, &dir).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "AGR-2024-000777_office-fast-secure-zusatzstandort.md"
        );
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Kulanzgutschrift"));

        fs::remove_dir_all(&dir).ok();
    }
}
