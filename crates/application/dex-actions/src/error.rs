use dex_core::{MemberId, ModelError};

use crate::ActionKind;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unknown member {0}")]
    UnknownMember(MemberId),
    #[error("action '{kind}' cannot be applied to a {subject_kind} member")]
    IncompatibleSubject {
        kind: ActionKind,
        subject_kind: &'static str,
    },
    #[error("action '{0}' has no subject")]
    NoSubject(ActionKind),
    #[error(transparent)]
    Model(#[from] ModelError),
}
