//! Skills module - tool-callable access to the triage pipeline

mod registry;
mod r#trait;

pub use registry::{create_default_registry, create_registry, SkillRegistry};
pub use r#trait::{
    schema, Finding, ScanParams, Severity, Skill, SkillError, SkillOutput, SkillResult,
};
