use crate::{Field, LibraryId, MemberId};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown member {0}")]
    UnknownMember(MemberId),
    #[error("unknown library {0}")]
    UnknownLibrary(LibraryId),
    #[error("field '{field}' does not apply to {kind} members")]
    FieldNotApplicable { field: Field, kind: &'static str },
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: Field, value: String },
    #[error("member {0} belongs to a library that is not editable")]
    NotEditable(MemberId),
    #[error("member {0} already exists")]
    DuplicateMember(MemberId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
