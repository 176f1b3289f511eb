use thiserror::Error;

/// A raw agreement record is missing a required field or has one of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema error at `{field}`: {reason}")]
pub struct SchemaError {
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }
}

/// The billing engine could not produce totals for its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid billing input: {reason}")]
pub struct InvalidInputError {
    pub reason: String,
}

impl InvalidInputError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read agreement data: {0}")]
    Io(#[from] std::io::Error),

    #[error("agreement data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("agreement data must be an array or an object with an `agreements` array")]
    Layout,

    #[error("agreement #{index}: {source}")]
    Schema {
        index: usize,
        #[source]
        source: SchemaError,
    },

    #[error("agreement id `{0}` appears more than once")]
    DuplicateId(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Billing(#[from] InvalidInputError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Billing(#[from] InvalidInputError),

    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("agreement not found: {0}")]
    NotFound(String),

    #[error("prompt cancelled: {0}")]
    Prompt(#[from] inquire::InquireError),
}
