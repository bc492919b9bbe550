use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    HttpRequestError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Credentials file error: {0}")]
    CredentialsError(#[from] dotenvy::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Spreadsheet read error: {0}")]
    SheetReadError(#[from] calamine::XlsxError),

    #[error("Spreadsheet write error: {0}")]
    SheetWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Other error: {0}")]
    Other(String),
}
