use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// A configuration value the extractor or corpus cannot work with
    #[error("Invalid configuration: {parameter} {reason}")]
    InvalidConfig { parameter: String, reason: String },

    /// Two signatures built under different extractor settings were compared
    #[error("Signature length mismatch: expected {expected}, found {found}")]
    SignatureLength { expected: usize, found: usize },

    /// A signature cell outside `[0, 1]` or not a finite number
    #[error("Invalid signature value {value} at cell {index}")]
    InvalidSignature { index: usize, value: f32 },

    #[error("No reference samples were found in the dataset")]
    EmptyCorpus,
}

impl Error {
    pub fn invalid_config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Text suitable for printing to the person running the identifier.
    pub fn user_message(&self) -> String {
        match self {
            Error::EmptyCorpus => {
                "No reference images found. Put images in one subfolder per category of the dataset folder.".to_string()
            }
            Error::SignatureLength { .. } => {
                "Reference fingerprints and query fingerprint were built with different settings.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages() {
        assert!(Error::EmptyCorpus
            .user_message()
            .contains("No reference images found"));
        assert!(Error::SignatureLength {
            expected: 324,
            found: 10
        }
        .user_message()
        .contains("different settings"));
        assert_eq!(
            Error::invalid_config("bins", "must be non-zero").user_message(),
            "Invalid configuration: bins must be non-zero"
        );
    }
}
