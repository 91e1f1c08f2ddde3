//! Symbol-name mapping trees.
//!
//! A [`MappingTree`] carries N symbolic namespaces per class, field, method
//! and parameter. Trees are parsed from tiny (v1/v2) or Proguard text, can be
//! inverted along any namespace or merged pairwise, and feed the bytecode
//! remapper. Comment and metadata side-data documents are emitted as JSON.

mod format;
mod proguard;
mod side_data;
mod tiny;
mod tree;

pub use format::MappingFormat;
pub use proguard::parse_proguard;
pub use side_data::{comments_json, write_comments_json, write_metadata_json, MappingMetadata};
pub use tiny::parse_tiny;
pub use tree::{
    ClassMapping, CombinedMappingTree, FieldMapping, MappingTree, MemberKey, MethodMapping,
    ParameterMapping,
};

pub type Result<T> = std::result::Result<T, MappingError>;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("bad mapping format at line {line}: {message}")]
    BadFormat { line: usize, message: String },
    #[error("inconsistent mappings: {0}")]
    InconsistentMappings(String),
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("class not present in mapping tree: {0}")]
    MissingClass(String),
    #[error("unsupported mapping input: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MappingError {
    pub(crate) fn bad_format(line: usize, message: impl Into<String>) -> Self {
        MappingError::BadFormat {
            line,
            message: message.into(),
        }
    }
}
