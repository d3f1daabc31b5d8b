//! Model catalog: role metadata, capabilities and identifier parsing.

mod variant;

pub use crate::model::{ModelDownloader, ModelRole, ModelSource, ModelStatus};
pub use variant::{parse_model_role, ModelTask, ParseModelRoleError};
