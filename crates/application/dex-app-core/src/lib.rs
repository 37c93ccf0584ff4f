pub mod app;
pub mod controllers;
pub mod domain;
pub mod persistence;
pub mod ports;
pub mod tasks;

pub use app::DexApplication;
pub use controllers::{
    MemberDetailsController, MemberTreeController, ValidationBoard, ValidationController,
};
pub use domain::{AppSettings, MemberRow, UnresolvedType};
pub use persistence::FilePersistence;
pub use ports::SettingsRepo;
pub use tasks::{load_model, LoadModelTask, ResolveTypesTask, ValidateModelTask};
