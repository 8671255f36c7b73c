//! The YAML languages served by the engine.
//!
//! Each [`Language`] bundles a schema built once at first use, the
//! whole-document rules that go beyond the schema, and the set of union
//! discriminator values a document overrides with its own definitions.
pub mod pipeline;
pub mod resources;
pub mod task;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use serde::Serialize;

use crate::error::PipelineError;
use crate::reconcile::semantic::DocumentRule;
use crate::schema::value::{DurationParser, IntegerParser, boolean};
use crate::schema::{EntityKind, ScalarType, Schema, SchemaBuilder, TypeId};
use crate::yaml::Ast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Pipeline,
    Task,
}

impl LanguageId {
    /// Maps an editor language id. Anything mentioning a task is a task file.
    pub fn from_lsp(language_id: &str) -> Self {
        if language_id.to_ascii_lowercase().contains("task") {
            LanguageId::Task
        } else {
            LanguageId::Pipeline
        }
    }

    /// Guesses the language from a file name: `task.yml`, `*-task.yml` and
    /// files under a `tasks/` directory are task files.
    pub fn from_path(path: &Path) -> Self {
        let in_tasks_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|d| d == "tasks" || d == "task");
        let stem_is_task = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s == "task" || s.ends_with("-task") || s.ends_with("_task"));
        if in_tasks_dir || stem_is_task {
            LanguageId::Task
        } else {
            LanguageId::Pipeline
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageId::Pipeline => "pipeline",
            LanguageId::Task => "task",
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LanguageId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pipeline" => Ok(LanguageId::Pipeline),
            "task" => Ok(LanguageId::Task),
            other => Err(PipelineError::UnknownLanguage(other.to_string())),
        }
    }
}

pub struct Language {
    pub id: LanguageId,
    pub schema: Schema,
    pub rules: Vec<Box<dyn DocumentRule>>,
    shadowed: fn(&Ast) -> HashSet<String>,
}

impl Language {
    /// Discriminator values the document redefines for itself.
    pub fn shadowed(&self, ast: &Ast) -> HashSet<String> {
        (self.shadowed)(ast)
    }
}

static PIPELINE: LazyLock<Language> = LazyLock::new(pipeline::language);
static TASK: LazyLock<Language> = LazyLock::new(task::language);

pub fn language(id: LanguageId) -> &'static Language {
    match id {
        LanguageId::Pipeline => &PIPELINE,
        LanguageId::Task => &TASK,
    }
}

fn no_shadowing(_: &Ast) -> HashSet<String> {
    HashSet::new()
}

/// Scalar types shared by both languages.
pub struct Common {
    pub string: TypeId,
    pub boolean: TypeId,
    pub integer: TypeId,
    pub positive: TypeId,
    pub duration: TypeId,
    pub any: TypeId,
    pub strings: TypeId,
    pub params: TypeId,
    /// Name of a resource type, linked to declarations when the language
    /// has them.
    pub resource_type: TypeId,
}

impl Common {
    pub fn new(b: &mut SchemaBuilder, resource_types: Option<EntityKind>) -> Self {
        let string = b.scalar("String", ScalarType::default());
        let any = b.any();
        let resource_type = match resource_types {
            Some(kind) => b.scalar(
                "Resource Type Name",
                ScalarType::reference(kind).non_blank("Resource Type cannot be blank"),
            ),
            None => b.scalar(
                "Resource Type Name",
                ScalarType::default().non_blank("Resource Type cannot be blank"),
            ),
        };
        Self {
            string,
            boolean: b.scalar("boolean", ScalarType::parsed(boolean())),
            integer: b.scalar("Integer", ScalarType::parsed(IntegerParser::new())),
            positive: b.scalar("Integer", ScalarType::parsed(IntegerParser::at_least(1))),
            duration: b.scalar("Duration", ScalarType::parsed(DurationParser::new())),
            any,
            strings: b.seq(string),
            params: b.map(any),
            resource_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(LanguageId::from_lsp("concourse-task-yaml"), LanguageId::Task);
        assert_eq!(LanguageId::from_lsp("concourse-pipeline-yaml"), LanguageId::Pipeline);
        assert_eq!(LanguageId::from_path(Path::new("ci/tasks/build.yml")), LanguageId::Task);
        assert_eq!(LanguageId::from_path(Path::new("ci/unit-task.yml")), LanguageId::Task);
        assert_eq!(LanguageId::from_path(Path::new("ci/pipeline.yml")), LanguageId::Pipeline);
        assert!("job".parse::<LanguageId>().is_err());
    }

    #[test]
    fn test_schemas_build() {
        assert_eq!(language(LanguageId::Pipeline).schema.name(), "pipeline");
        assert_eq!(language(LanguageId::Task).schema.name(), "task");
    }
}
