use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use inquire::Select;
use log::{debug, error};

use agreement_viewer::error::AppError;
use agreement_viewer::export::export_agreement;
use agreement_viewer::settings::{AppSettings, load_settings, setup_config_wizard};
use agreement_viewer::view::{AgreementChoice, Section, format_money, render_detail, render_entry_list};
use agreement_viewer::{Agreement, AgreementCatalog, AgreementFilter, StatusFilter};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "agreement-viewer", about = "Read-only view of telecom agreements and their billing")]
struct Cli {
    /// Agreement data file (JSON). Overrides the configured one.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List agreements with their monthly net amount
    List {
        /// Match against agreement id or name
        #[arg(short, long, default_value = "")]
        query: String,
        /// Status to show (all, active, suspended, draft, ...)
        #[arg(short, long, default_value = "all")]
        status: String,
    },
    /// Show one agreement
    Show {
        id: String,
        /// Only render this section
        #[arg(long, value_enum)]
        section: Option<Section>,
    },
    /// Print net, tax and gross for an agreement
    Totals {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Pick an agreement interactively and show it
    Open,
    /// Render an agreement to Markdown in the export directory
    Export { id: String },
    /// Configure data file and export directory
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(command, cli.data) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, data: Option<PathBuf>) -> Result<(), AppError> {
    match command {
        Commands::List { query, status } => {
            let (_, catalog) = open_catalog(data)?;
            let filter = AgreementFilter { query, status: StatusFilter::from_label(&status) };
            let found = catalog.search(&filter);
            println!("--- Agreements ({} of {}) ---", found.len(), catalog.len());
            if found.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", render_entry_list(&found)?);
            }
        }
        Commands::Show { id, section } => {
            let (_, catalog) = open_catalog(data)?;
            print!("{}", render_detail(find(&catalog, &id)?, section)?);
        }
        Commands::Totals { id, json } => {
            let (_, catalog) = open_catalog(data)?;
            let agreement = find(&catalog, &id)?;
            let totals = agreement.billing.totals()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&totals)?);
            } else {
                let currency = &agreement.billing.currency;
                println!("Net:   {}", format_money(totals.net, currency));
                println!(
                    "Tax:   {} ({}%)",
                    format_money(totals.tax, currency),
                    agreement.billing.tax_percent.normalize()
                );
                println!("Gross: {}", format_money(totals.gross, currency));
            }
        }
        Commands::Open => {
            let (_, catalog) = open_catalog(data)?;
            print!("{}", render_detail(select_agreement(&catalog)?, None)?);
        }
        Commands::Export { id } => {
            let (settings, catalog) = open_catalog(data)?;
            let path = export_agreement(find(&catalog, &id)?, &settings.export_path())?;
            println!("Exported: {}", path.display());
        }
        Commands::Config => {
            setup_config_wizard()?;
        }
    }
    Ok(())
}

// ==========================================
// Helpers
// ==========================================

/// Settings plus the catalog from `--data`, the configured file, or the built-in sample.
fn open_catalog(data: Option<PathBuf>) -> Result<(AppSettings, AgreementCatalog), AppError> {
    let settings = load_settings()?;
    let catalog = match data.or_else(|| settings.data_path()) {
        Some(path) => AgreementCatalog::from_path(&path)?,
        None => {
            debug!("No data file configured, using the built-in sample");
            AgreementCatalog::sample()?
        }
    };
    Ok((settings, catalog))
}

fn find<'a>(catalog: &'a AgreementCatalog, id: &str) -> Result<&'a Agreement, AppError> {
    catalog.get(id).ok_or_else(|| AppError::NotFound(id.to_string()))
}

fn select_agreement(catalog: &AgreementCatalog) -> Result<&Agreement, AppError> {
    let options: Vec<AgreementChoice> = catalog.iter().map(AgreementChoice).collect();
    let choice = Select::new("Select Agreement (Type to Filter):", options).with_page_size(10).prompt()?;
    Ok(choice.0)
}
