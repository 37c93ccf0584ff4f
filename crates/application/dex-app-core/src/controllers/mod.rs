//! Headless controllers coordinating the editor views through events.

mod member_details;
mod member_tree;
mod validation;

pub use member_details::MemberDetailsController;
pub use member_tree::MemberTreeController;
pub use validation::{ValidationBoard, ValidationController};
