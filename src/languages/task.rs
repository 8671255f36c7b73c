//! Task configuration files, also embedded as `config:` of a task step.

use super::{Common, Language, LanguageId, no_shadowing, resources};
use crate::schema::value::EnumParser;
use crate::schema::{BeanType, Constraint, Property, ScalarType, SchemaBuilder, TypeId};

const IMAGE_KEYS: &[&str] = &["image_resource", "rootfs_uri", "image"];

fn p(name: &str, ty: TypeId) -> Property {
    Property::new(name, ty)
}

/// Defines the task config type. `source` types `image_resource.source`.
///
/// An `embedded` config (the `config:` of a pipeline task step) must name
/// its image; a task file may leave that to whoever runs it.
pub fn config(b: &mut SchemaBuilder, c: &Common, source: TypeId, embedded: bool) -> TypeId {
    let platform = b.scalar(
        "Platform",
        ScalarType::parsed(EnumParser::new("Platform", &["linux", "darwin", "windows"])),
    );
    let run = b.bean(
        "Command",
        BeanType::new()
            .prop(
                p("path", c.string)
                    .required()
                    .describe("The command to execute, relative to the task's working directory."),
            )
            .props([
                p("args", c.strings).describe("Arguments to pass to the command."),
                p("dir", c.string).describe("Directory to run the command in."),
                p("user", c.string).describe("Explicitly set the user to run as."),
            ]),
    );
    let image_resource = b.bean(
        "ImageResource",
        BeanType::new()
            .prop(
                p("type", c.resource_type)
                    .required()
                    .describe("The type of the resource providing the container image."),
            )
            .prop(p("source", source).required())
            .props([
                p("params", c.params),
                p("version", c.params),
            ]),
    );
    let input = b.bean(
        "TaskInput",
        BeanType::new()
            .prop(p("name", c.string).required().describe("The name of the input."))
            .props([
                p("path", c.string),
                p("optional", c.boolean),
            ])
            .primary("name"),
    );
    let output = b.bean(
        "TaskOutput",
        BeanType::new()
            .prop(p("name", c.string).required())
            .prop(p("path", c.string))
            .primary("name"),
    );
    let cache = b.bean(
        "TaskCache",
        BeanType::new().prop(p("path", c.string).required()),
    );
    let limits = b.bean(
        "ContainerLimits",
        BeanType::new().props([
            p("cpu", c.integer).describe("CPU shares for the container."),
            p("memory", c.integer).describe("Memory limit in bytes."),
        ]),
    );
    let inputs = b.seq(input);
    let outputs = b.seq(output);
    let caches = b.seq(cache);
    let mut bean = BeanType::new()
        .prop(
            p("platform", platform)
                .required()
                .describe("The platform the task should run on."),
        )
        .prop(
            p("run", run)
                .required()
                .describe("The command to execute in the container."),
        )
        .props([
            p("image_resource", image_resource)
                .describe("The base image of the container, as provided by a resource."),
            p("rootfs_uri", c.string).describe("A URL pointing at a pre-built root filesystem."),
            p("image", c.string)
                .deprecated(Some("rootfs_uri"))
                .describe("Renamed to `rootfs_uri`."),
            p("inputs", inputs).describe("Artifacts expected as inputs to the task."),
            p("outputs", outputs).describe("Artifacts produced by the task."),
            p("caches", caches).describe("Directories cached between runs of the task."),
            p("params", c.params).describe("Environment variables for the task."),
            p("container_limits", limits),
        ])
        .constraint(Constraint::only_one_of(IMAGE_KEYS).warning());
    if embedded {
        bean = bean.constraint(Constraint::require_one_of(IMAGE_KEYS).warning());
    }
    b.bean("TaskConfig", bean)
}

pub fn language() -> Language {
    let mut b = SchemaBuilder::new("task");
    let common = Common::new(&mut b, None);
    let source = resources::source(&mut b, &common);
    let root = config(&mut b, &common, source, false);
    Language {
        id: LanguageId::Task,
        schema: b.build(root),
        rules: Vec::new(),
        shadowed: no_shadowing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_root_requires_platform_and_run() {
        let language = language();
        let schema = &language.schema;
        let root = schema.bean(schema.root()).unwrap();
        let required: Vec<&str> = root
            .properties
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(required, vec!["platform", "run"]);
        assert_eq!(schema.type_name(schema.root()), "TaskConfig");
    }
}
