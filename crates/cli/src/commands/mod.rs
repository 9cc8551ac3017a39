//! CLI subcommands and the startup steps they share.

pub mod ask;
pub mod doctor;
pub mod retrieve;
pub mod serve;

use imali_agent::PredictPipeline;
use imali_config::{AppConfig, ConfigError};
use imali_playbook::KnowledgeBase;
use std::path::Path;
use std::sync::Arc;

/// Load config from `--config`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_path(path),
        None => AppConfig::load(),
    }
}

/// Load the playbook named by the config. Fatal on any error.
pub fn load_playbook(config: &AppConfig) -> Result<KnowledgeBase, imali_core::PlaybookError> {
    KnowledgeBase::load(&config.playbook.path, &config.playbook.fallback_path)
}

/// Everything a request needs: config, playbook, and generation backend.
pub fn build_pipeline(config: &AppConfig) -> Result<PredictPipeline, imali_core::Error> {
    let knowledge_base = load_playbook(config)?;
    let provider = imali_providers::build_from_config(config)?;
    Ok(PredictPipeline::new(
        Arc::new(knowledge_base),
        provider,
        config.generation,
    ))
}
