use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to parse configuration TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to retrieve data from {url}. Error: {message}")]
    Transport { url: String, message: String },
    #[error("Response from {url} is not valid UTF-8: {source}")]
    Encoding {
        url: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Response is not valid XML, or the structure has changed significantly: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Failed to extract driver from {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Arrow Error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// A single `Driver` entry that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("driver '{driver_id}' is missing required element <{element}>")]
    MissingElement {
        driver_id: String,
        element: &'static str,
    },
    #[error("driver element is missing required attribute '{attribute}'")]
    MissingAttribute { attribute: &'static str },
    #[error("no year segment in request URL {url}")]
    MissingYearSegment { url: String },
}
