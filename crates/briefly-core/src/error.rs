use thiserror::Error;

/// Rejections produced while validating a preferences submission.
///
/// The `Display` text is returned verbatim to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid categories")]
    InvalidCategories,

    #[error("Invalid frequency")]
    InvalidFrequency,

    #[error("Invalid email")]
    InvalidEmail,
}
