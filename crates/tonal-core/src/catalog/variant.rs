//! Model role capability helpers and parser utilities.

use std::fmt;

use crate::model::ModelRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    Classification,
    Text2Text,
}

#[derive(Debug, Clone)]
pub struct ParseModelRoleError {
    input: String,
}

impl ParseModelRoleError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

impl fmt::Display for ParseModelRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trimmed = self.input.trim();
        write!(
            f,
            "Unsupported model identifier: {}",
            if trimmed.is_empty() { "<empty>" } else { trimmed }
        )
    }
}

impl std::error::Error for ParseModelRoleError {}

impl ModelRole {
    pub fn task(&self) -> ModelTask {
        match self {
            ModelRole::ToneAnalyzer | ModelRole::OceanAnalyzer => ModelTask::Classification,
            ModelRole::Rewriter => ModelTask::Text2Text,
        }
    }
}

/// Resolve a role from its slug, display name, repo id or repo tail.
pub fn parse_model_role(input: &str) -> Result<ModelRole, ParseModelRoleError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseModelRoleError::new(input));
    }

    let normalized = normalize_identifier(trimmed);

    if let Some(found) = ModelRole::all()
        .iter()
        .copied()
        .find(|role| matches_role_alias(*role, &normalized))
    {
        return Ok(found);
    }

    resolve_by_heuristic(&normalized).ok_or_else(|| ParseModelRoleError::new(input))
}

fn resolve_by_heuristic(normalized: &str) -> Option<ModelRole> {
    if normalized.contains("ocean")
        || normalized.contains("psychological")
        || normalized.contains("bigfive")
    {
        return Some(ModelRole::OceanAnalyzer);
    }

    if normalized.contains("rewrite") {
        return Some(ModelRole::Rewriter);
    }

    if normalized.contains("tone") {
        return Some(ModelRole::ToneAnalyzer);
    }

    None
}

fn matches_role_alias(role: ModelRole, normalized: &str) -> bool {
    let repo = role.repo_id();
    let repo_tail = repo.rsplit('/').next().unwrap_or(repo);

    [role.slug(), repo, repo_tail, role.display_name()]
        .iter()
        .any(|alias| normalize_identifier(alias) == normalized)
}

fn normalize_identifier(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
