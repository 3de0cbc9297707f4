#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("no usable access key; configure an API key or sign in")]
    Auth,
    #[error("service error ({code}): {message}")]
    Service { code: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http status {0}: {1}")]
    HttpStatus(u16, String),
}

impl ApiError {
    /// The message a user should see for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Service { message, .. } => message.clone(),
            ApiError::Auth => self.to_string(),
            _ => "An unknown error occurred accessing the asset service".to_string(),
        }
    }
}
