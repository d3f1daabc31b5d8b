//! Model metadata and Hub downloads

pub mod download;
pub mod info;

pub use download::ModelDownloader;
pub use info::{ModelRole, ModelSource, ModelStatus};
