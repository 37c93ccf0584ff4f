use serde::{Deserialize, Serialize};

use dex_core::MemberId;

fn default_undo_limit() -> usize {
    dex_config::DEFAULT_UNDO_LIMIT
}

fn default_channel_capacity() -> usize {
    dex_config::DEFAULT_TASK_CHANNEL_CAPACITY
}

fn default_validate_on_change() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,
    /// Re-validate the model in the background after every modification.
    #[serde(default = "default_validate_on_change")]
    pub validate_on_change: bool,
    #[serde(default = "default_channel_capacity")]
    pub task_channel_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            undo_limit: default_undo_limit(),
            validate_on_change: default_validate_on_change(),
            task_channel_capacity: default_channel_capacity(),
        }
    }
}

/// One line of the member tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub id: MemberId,
    pub name: String,
    pub kind: &'static str,
    pub library: String,
    pub editable: bool,
    pub deprecated: bool,
    /// Findings reported for the member by the most recent validation.
    pub findings: usize,
}

/// A property or base type naming a type that is not in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedType {
    pub member: MemberId,
    pub member_name: String,
    pub property: Option<String>,
    pub type_ref: String,
}
