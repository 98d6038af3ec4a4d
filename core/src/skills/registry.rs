//! Skill Registry - the named skills a caller can invoke

use super::r#trait::{Skill, SkillError, SkillOutput, SkillResult};
use crate::config::ScanConfig;
use crate::pipeline::PipelineController;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of available skills, listed in name order
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: BTreeMap::new(),
        }
    }

    pub fn register<S: Skill + 'static>(&mut self, skill: S) {
        let name = skill.name().to_string();
        self.skills.insert(name, Arc::new(skill));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.skills.keys().map(|s| s.as_str()).collect()
    }

    /// Get all skill schemas for tool calling
    pub fn schemas(&self) -> Vec<Value> {
        self.skills.values().map(|s| s.schema()).collect()
    }

    pub fn invoke(&self, name: &str, params: Value) -> SkillResult<SkillOutput> {
        match self.skills.get(name) {
            Some(skill) => skill.execute(params),
            None => Err(SkillError::InvalidParams(format!(
                "Unknown skill: {}",
                name
            ))),
        }
    }

    /// Export all schemas as JSON for tool-calling clients
    pub fn export_schemas(&self) -> Value {
        serde_json::json!({
            "skills": self.schemas(),
            "version": "1.0",
            "format": "openai_function_calling"
        })
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry whose skills share one pipeline built from `config`
pub fn create_registry(config: &ScanConfig) -> SkillResult<SkillRegistry> {
    use crate::detectors::{LsbDetector, PayloadExtractor};

    let controller = Arc::new(PipelineController::new(config)?);

    let mut registry = SkillRegistry::new();
    registry.register(LsbDetector::new(Arc::clone(&controller)));
    registry.register(PayloadExtractor::new(controller));

    Ok(registry)
}

/// Registry with the default configuration
pub fn create_default_registry() -> SkillRegistry {
    create_registry(&ScanConfig::default()).expect("default configuration is valid")
}
