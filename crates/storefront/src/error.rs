use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unparseable product list (json: {json}; xml: {xml}); payload starts with: {preview}")]
    Parse {
        json: String,
        xml: String,
        preview: String,
    },
}
