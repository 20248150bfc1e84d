use thiserror::Error;

/// Errors raised while loading, validating or parameterizing morphologies.
///
/// Building a granule cell from geometry never fails; everything that reads
/// external input or checks a finished tree goes through this type.
#[derive(Debug, Error)]
pub enum MorphologyError {
    #[error("Failed to read or write morphology file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Config(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("SWC line {line}: {reason}")]
    Swc { line: usize, reason: String },

    #[error("No root node found (parent_id == -1)")]
    NoRoot,

    #[error("Unknown cell model variant: {0}")]
    UnknownVariant(String),

    #[error("Section {section} sets {attribute} on mechanism {mechanism}, which is not inserted")]
    MissingMechanism {
        section: String,
        attribute: String,
        mechanism: String,
    },

    #[error("Broken compartment tree at section {section}: {reason}")]
    BrokenTree { section: String, reason: String },
}

impl From<toml::de::Error> for MorphologyError {
    fn from(err: toml::de::Error) -> Self {
        MorphologyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MorphologyError>;
