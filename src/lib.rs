//! Read-only viewer for telecom agreement records with an exact billing aggregation engine.

pub mod billing;
pub mod catalog;
pub mod error;
pub mod export;
pub mod model;
pub mod schema;
pub mod settings;
pub mod view;

pub use billing::{Totals, aggregate, aggregate_value, line_amount};
pub use catalog::{AgreementCatalog, AgreementFilter, StatusFilter};
pub use error::{AppError, CatalogError, InvalidInputError, SchemaError};
pub use model::Agreement;
pub use schema::parse_agreement;
