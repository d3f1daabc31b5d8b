//! Model roles and metadata

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The three models the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelRole {
    /// Four-way tone classifier (Positive, Agitated, Inquisitive, Casual)
    ToneAnalyzer,
    /// Big Five psychological trait classifier
    OceanAnalyzer,
    /// Tone-conditioned text-to-text rewriter
    Rewriter,
}

impl ModelRole {
    pub fn all() -> &'static [ModelRole] {
        &[Self::ToneAnalyzer, Self::OceanAnalyzer, Self::Rewriter]
    }

    /// Default HuggingFace repository ID
    pub fn repo_id(&self) -> &'static str {
        match self {
            Self::ToneAnalyzer => "goks24/platinum-tone-analyzer",
            Self::OceanAnalyzer => "goks24/psychological-tone-analyzer-v2",
            Self::Rewriter => "goks24/Email_rewriter_cum_tone_analyzer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ToneAnalyzer => "Tone Analyzer",
            Self::OceanAnalyzer => "Psychological Analyzer",
            Self::Rewriter => "Email Rewriter",
        }
    }

    /// Short identifier used in config files and logs
    pub fn slug(&self) -> &'static str {
        match self {
            Self::ToneAnalyzer => "tone-analyzer",
            Self::OceanAnalyzer => "ocean-analyzer",
            Self::Rewriter => "rewriter",
        }
    }

    /// Local directory name for a repository under the models directory.
    ///
    /// `owner/name` becomes `owner--name` so custom repos never collide.
    pub fn dir_name_for(repo_id: &str) -> String {
        repo_id.trim().trim_matches('/').replace('/', "--")
    }

    pub fn is_classifier(&self) -> bool {
        matches!(self, Self::ToneAnalyzer | Self::OceanAnalyzer)
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Where a role's weights come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSource {
    pub repo_id: String,

    /// Git revision on the Hub
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Pre-populated model directory; skips the Hub entirely
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl ModelSource {
    pub fn for_role(role: ModelRole) -> Self {
        Self {
            repo_id: role.repo_id().to_string(),
            revision: default_revision(),
            local_path: None,
        }
    }
}

fn default_revision() -> String {
    "main".to_string()
}

/// Load state reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub tone_analyzer: bool,
    pub ocean_analyzer: bool,
    pub rewriter: bool,
}

impl ModelStatus {
    pub fn all_loaded(&self) -> bool {
        self.tone_analyzer && self.ocean_analyzer && self.rewriter
    }
}
