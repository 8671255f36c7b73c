//! Pipeline definitions: resources, resource types, jobs and their plans.

use std::collections::HashSet;

use super::{Common, Language, LanguageId, resources, task};
use crate::reconcile::glob::SimpleGlob;
use crate::reconcile::semantic::{DocumentRule, RuleContext};
use crate::reconcile::{Problem, ProblemCode};
use crate::schema::value::{DurationParser, EnumParser};
use crate::schema::{
    BeanType, Constraint, Dispatch, EntityKindDef, Property, Requirement, ScalarType,
    SchemaBuilder, TypeId, TypeKind, UnionType,
};
use crate::yaml::{Ast, NodeKind};

fn p(name: &str, ty: TypeId) -> Property {
    Property::new(name, ty)
}

const STEP_KEYS: &[&str] = &[
    "get",
    "put",
    "task",
    "set_pipeline",
    "load_var",
    "in_parallel",
    "aggregate",
    "do",
    "try",
];

const HOOKS: &[&str] = &["on_success", "on_failure", "on_abort", "on_error", "ensure"];

struct Refs {
    resource: TypeId,
    job: TypeId,
    job_glob: TypeId,
    artifact: TypeId,
}

/// Modifiers accepted by every step.
fn modifiers(c: &Common, step: TypeId, across: TypeId) -> Vec<Property> {
    let mut props = vec![
        p("timeout", c.duration).describe("Abort the step when it runs longer than this."),
        p("attempts", c.positive).describe("Number of times to try the step before failing."),
        p("tags", c.strings).describe("Run the step on workers with these tags."),
        p("across", across),
    ];
    props.extend(HOOKS.iter().map(|hook| p(hook, step)));
    props
}

fn steps(b: &mut SchemaBuilder, c: &Common, refs: &Refs, source: TypeId) -> TypeId {
    let step = b.declare("Step");
    let step_list = b.seq(step);
    let across_var = b.bean(
        "AcrossVar",
        BeanType::new()
            .prop(p("var", c.string).required())
            .prop(p("values", c.any).required())
            .prop(p("max_in_flight", c.any)),
    );
    let across = b.seq(across_var);
    let common = |extra: Vec<Property>| {
        let mut props = extra;
        props.extend(modifiers(c, step, across));
        props
    };

    let passed = b.seq(refs.job);
    let get = b.bean(
        "GetStep",
        BeanType::new()
            .props(common(vec![
                p("get", refs.resource)
                    .required()
                    .shadowed_by("resource")
                    .describe("Fetches a version of a resource. Names the artifact, and the resource unless `resource` is given."),
                p("resource", refs.resource).describe("The resource to fetch when `get` names a local alias."),
                p("passed", passed)
                    .describe("Only versions that passed through all of these jobs are fetched."),
                p("params", c.params),
                p("trigger", c.boolean).describe("New versions of the resource trigger the job."),
                p("version", c.any),
            ]))
            .primary("get"),
    );

    let inputs_keyword = b.scalar(
        "Put Inputs",
        ScalarType::parsed(EnumParser::new("Put Inputs", &["all", "detect"])),
    );
    let inputs_list = b.seq(refs.artifact);
    let put_inputs = b.union("PutInputs", vec![inputs_keyword, inputs_list], Dispatch::Shape);
    let put = b.bean(
        "PutStep",
        BeanType::new()
            .props(common(vec![
                p("put", refs.resource)
                    .required()
                    .shadowed_by("resource")
                    .describe("Pushes to a resource, then fetches the new version."),
                p("resource", refs.resource),
                p("inputs", put_inputs)
                    .describe("Artifacts available to the put: `all`, `detect` or a list."),
                p("params", c.params),
                p("get_params", c.params),
                p("no_get", c.boolean),
            ]))
            .primary("put"),
    );

    let config = task::config(b, c, source, true);
    let artifact_map = b.map(refs.artifact);
    let string_map = b.map(c.string);
    let limits = b.bean(
        "StepContainerLimits",
        BeanType::new().props([p("cpu", c.integer), p("memory", c.integer)]),
    );
    let task_step = b.bean(
        "TaskStep",
        BeanType::new()
            .props(common(vec![
                p("task", c.string).required().describe("Runs a task. Names the step."),
                p("config", config).describe("The task configuration, inline."),
                p("file", c.string).describe("Path of a task configuration inside an artifact."),
                p("image", refs.artifact).describe("Artifact providing the container image."),
                p("privileged", c.boolean),
                p("vars", c.params),
                p("params", c.params),
                p("input_mapping", artifact_map),
                p("output_mapping", string_map),
                p("container_limits", limits),
                p("hermetic", c.boolean),
            ]))
            .constraint(Constraint::require_one_of(&["config", "file"]).warning())
            .constraint(Constraint::only_one_of(&["config", "file"]).warning())
            .constraint(Constraint::implies("vars", "file"))
            .primary("task"),
    );

    let set_pipeline = b.bean(
        "SetPipelineStep",
        BeanType::new()
            .props(common(vec![
                p("set_pipeline", c.string).required().describe("Configures a pipeline."),
                p("file", c.string).required(),
                p("vars", c.params),
                p("var_files", c.strings),
                p("instance_vars", c.params),
                p("team", c.string),
            ]))
            .primary("set_pipeline"),
    );

    let var_format = b.scalar(
        "Var Format",
        ScalarType::parsed(EnumParser::new("Var Format", &["json", "yaml", "yml", "trim", "raw"])),
    );
    let load_var = b.bean(
        "LoadVarStep",
        BeanType::new()
            .props(common(vec![
                p("load_var", c.string).required().describe("Loads a file into a local var."),
                p("file", c.string).required(),
                p("format", var_format),
                p("reveal", c.boolean),
            ]))
            .primary("load_var"),
    );

    let parallel_config = b.bean(
        "InParallelConfig",
        BeanType::new()
            .prop(p("steps", step_list).required())
            .props([p("limit", c.positive), p("fail_fast", c.boolean)]),
    );
    let parallel_value = b.union(
        "InParallel",
        vec![step_list, parallel_config],
        Dispatch::Shape,
    );
    let in_parallel = b.bean(
        "InParallelStep",
        BeanType::new()
            .props(common(vec![p("in_parallel", parallel_value)
                .required()
                .describe("Runs steps in parallel.")]))
            .primary("in_parallel"),
    );
    let aggregate = b.bean(
        "AggregateStep",
        BeanType::new()
            .props(common(vec![p("aggregate", step_list)
                .required()
                .deprecated(Some("in_parallel"))]))
            .primary("aggregate"),
    );
    let do_step = b.bean(
        "DoStep",
        BeanType::new()
            .props(common(vec![p("do", step_list)
                .required()
                .describe("Runs steps in sequence.")]))
            .primary("do"),
    );
    let try_step = b.bean(
        "TryStep",
        BeanType::new()
            .props(common(vec![p("try", step)
                .required()
                .describe("Runs a step and ignores its failure.")]))
            .primary("try"),
    );

    let alternatives = vec![
        get,
        put,
        task_step,
        set_pipeline,
        load_var,
        in_parallel,
        aggregate,
        do_step,
        try_step,
    ];
    // Without a step key every step property is offered.
    let mut any_step = BeanType::new().constraint(Constraint::require_one_of(STEP_KEYS));
    for ty in &alternatives {
        let Some(bean) = b.bean_def(*ty) else {
            continue;
        };
        for property in &bean.properties {
            if any_step.property(&property.name).is_none() {
                let mut property = property.clone();
                property.requirement = Requirement::Optional;
                any_step.properties.push(property);
            }
        }
    }
    let fallback = b.bean("Step", any_step);
    b.define(
        step,
        TypeKind::Union(UnionType {
            alternatives,
            dispatch: Dispatch::PrimaryProperty { fallback },
        }),
    )
}

fn var_sources(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let kind = b.scalar(
        "Var Source Type",
        ScalarType::parsed(EnumParser::new(
            "Var Source Type",
            &["vault", "ssm", "secretsmanager", "dummy"],
        )),
    );
    let vault = b.bean(
        "VaultConfig",
        BeanType::new()
            .prop(p("url", c.string).required().describe("The URL of the Vault server."))
            .props([
                p("path_prefix", c.string),
                p("lookup_templates", c.strings),
                p("shared_path", c.string),
                p("namespace", c.string),
                p("ca_cert", c.string),
                p("client_cert", c.string),
                p("client_key", c.string),
                p("server_name", c.string),
                p("insecure_skip_verify", c.boolean),
                p("client_token", c.string),
                p("auth_backend", c.string),
                p("auth_params", c.params),
                p("auth_max_ttl", c.duration),
                p("auth_retry_max", c.duration),
                p("auth_retry_initial", c.duration),
            ]),
    );
    let aws = |b: &mut SchemaBuilder, name: &str| {
        b.bean(
            name,
            BeanType::new()
                .prop(p("region", c.string).required())
                .props([
                    p("access_key", c.string),
                    p("secret_key", c.string),
                    p("session_token", c.string),
                ]),
        )
    };
    let ssm = aws(b, "SsmConfig");
    let secrets = aws(b, "SecretsManagerConfig");
    let dummy = b.bean("DummyConfig", BeanType::new().prop(p("vars", c.params)));
    let config = b.union(
        "VarSourceConfig",
        vec![vault, ssm, secrets, dummy],
        Dispatch::Field {
            key: "type".to_string(),
            from_parent: true,
            shadowable: false,
            default: None,
            cases: vec![
                ("vault".to_string(), vault),
                ("ssm".to_string(), ssm),
                ("secretsmanager".to_string(), secrets),
                ("dummy".to_string(), dummy),
            ],
            fallback: c.params,
        },
    );
    let var_source = b.bean(
        "VarSource",
        BeanType::new()
            .prop(p("name", c.string).required())
            .prop(p("type", kind).required())
            .prop(p("config", config)),
    );
    b.seq(var_source)
}

pub fn language() -> Language {
    let mut b = SchemaBuilder::new("pipeline");
    let resource_kind = b.entity_kind(EntityKindDef::new("Resource", "Resources", "resource").requires_usage());
    let resource_type_kind = b.entity_kind(
        EntityKindDef::new("Resource Type", "Resource Types", "resource-type")
            .requires_usage()
            .builtins(resources::BUILTIN_TYPES),
    );
    let job_kind = b.entity_kind(EntityKindDef::new("Job", "Jobs", "job"));
    let group_kind = b.entity_kind(EntityKindDef::new("Group", "Groups", "group"));

    let c = Common::new(&mut b, Some(resource_type_kind));
    let refs = Refs {
        resource: b.scalar("Resource Name", ScalarType::reference(resource_kind)),
        job: b.scalar("Job Name", ScalarType::reference(job_kind)),
        job_glob: b.scalar("Job Name", ScalarType::glob(job_kind)),
        artifact: b.scalar("Artifact Name", ScalarType::suggest(resource_kind)),
    };
    let check_every = b.scalar(
        "Duration",
        ScalarType::parsed(DurationParser::or_keywords(&["never"])),
    );
    let source = resources::source(&mut b, &c);

    let resource = b.bean(
        "Resource",
        BeanType::new()
            .prop(
                p("name", c.string)
                    .required()
                    .declares(resource_kind)
                    .describe("The name of the resource, referenced by steps."),
            )
            .prop(
                p("type", c.resource_type)
                    .required()
                    .describe("The resource type implementing the resource."),
            )
            .props([
                p("source", source).describe("Configuration for the resource, specific to its type."),
                p("check_every", check_every)
                    .describe("Interval between checks for new versions, or `never`."),
                p("icon", c.string).describe("Name of a Material Design icon shown in the UI."),
                p("old_name", c.string),
                p("tags", c.strings),
                p("webhook_token", c.string),
                p("public", c.boolean),
                p("version", c.any),
                p("check_timeout", c.duration),
            ])
            .primary("name"),
    );

    let resource_type = b.bean(
        "ResourceType",
        BeanType::new()
            .prop(
                p("name", c.string)
                    .required()
                    .declares(resource_type_kind)
                    .describe("The name of the resource type, used as `type` by resources."),
            )
            .prop(
                p("type", c.resource_type)
                    .required()
                    .describe("The type of resource that provides the container image."),
            )
            .props([
                p("source", source),
                p("privileged", c.boolean),
                p("params", c.params),
                p("check_every", check_every),
                p("tags", c.strings),
                p("defaults", c.params),
                p("unique_version_history", c.boolean),
            ])
            .primary("name"),
    );

    let plan = steps(&mut b, &c, &refs, source);
    let plan_list = b.seq(plan);
    let retention = b.bean(
        "BuildLogRetention",
        BeanType::new().props([
            p("builds", c.integer),
            p("days", c.integer),
            p("minimum_succeeded_builds", c.integer),
        ]),
    );
    let mut job_bean = BeanType::new()
        .prop(
            p("name", c.string)
                .required()
                .declares(job_kind)
                .describe("The name of the job."),
        )
        .prop(
            p("plan", plan_list)
                .soft_required()
                .describe("The sequence of steps to execute."),
        )
        .props([
            p("old_name", c.string),
            p("serial", c.boolean).describe("Run builds one at a time."),
            p("serial_groups", c.strings),
            p("max_in_flight", c.positive),
            p("build_log_retention", retention),
            p("build_logs_to_retain", c.integer).deprecated(Some("build_log_retention")),
            p("public", c.boolean),
            p("disable_manual_trigger", c.boolean),
            p("interruptible", c.boolean),
        ])
        .primary("name");
    job_bean = job_bean.props(HOOKS.iter().map(|hook| p(hook, plan)));
    let job = b.bean("Job", job_bean);

    let group_jobs = b.seq(refs.job_glob);
    let group_resources = b.seq(refs.resource);
    let group = b.bean(
        "Group",
        BeanType::new()
            .prop(p("name", c.string).required().declares(group_kind))
            .props([
                p("jobs", group_jobs)
                    .describe("Jobs shown in the group. Entries may use `*` and `?` wildcards."),
                p("resources", group_resources),
            ])
            .primary("name"),
    );
    let non_empty = b.scalar(
        "String",
        ScalarType::default().non_blank("String should not be empty"),
    );
    let display = b.bean(
        "Display",
        BeanType::new().props([
            p("background_image", non_empty).describe("URL of an image shown behind the pipeline."),
            p("background_filter", c.string),
        ]),
    );
    let var_source_list = var_sources(&mut b, &c);
    let resource_list = b.seq(resource);
    let resource_type_list = b.seq(resource_type);
    let job_list = b.seq(job);
    let group_list = b.seq(group);
    let root = b.bean(
        "Pipeline",
        BeanType::new().props([
            p("resources", resource_list).describe("Things jobs fetch from and push to."),
            p("resource_types", resource_type_list).describe("Custom resource type definitions."),
            p("jobs", job_list).describe("The jobs of the pipeline."),
            p("groups", group_list).describe("Tabs grouping jobs in the UI."),
            p("display", display),
            p("var_sources", var_source_list).describe("Credential managers for `((var))` lookups."),
        ]),
    );

    Language {
        id: LanguageId::Pipeline,
        schema: b.build(root),
        rules: vec![
            Box::new(GroupCompleteness),
            Box::new(PassedInteraction),
        ],
        shadowed: declared_resource_types,
    }
}

/// Resource type names declared under `resource_types`.
fn declared_resource_types(ast: &Ast) -> HashSet<String> {
    let mut names = HashSet::new();
    for root in ast.documents() {
        let Some(list) = ast.get(*root, "resource_types") else {
            continue;
        };
        let list = ast.resolve(list);
        if let NodeKind::Sequence(items) = ast.kind(list) {
            for item in items {
                if let Some(name) = ast.get_str(ast.resolve(item.value), "name") {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names
}

/// Once any group lists jobs, every job must appear in some group.
struct GroupCompleteness;

impl DocumentRule for GroupCompleteness {
    fn name(&self) -> &'static str {
        "group-completeness"
    }

    fn check(&self, ctx: &RuleContext<'_>, problems: &mut Vec<Problem>) {
        let Some((job_kind, _)) = ctx.schema.entity_kinds().find(|(_, def)| def.label == "Job") else {
            return;
        };
        let patterns: Vec<&str> = ctx
            .index
            .references()
            .iter()
            .filter(|r| r.spec.kind == job_kind && r.spec.glob)
            .map(|r| r.name.as_str())
            .collect();
        if patterns.is_empty() {
            return;
        }
        let mut globs = Vec::new();
        for pattern in patterns {
            match SimpleGlob::parse(pattern) {
                Some(glob) => globs.push(glob),
                None => {
                    tracing::debug!(pattern, "group pattern not interpreted, skipping group check");
                    return;
                }
            }
        }
        for declaration in ctx.index.declarations_of(job_kind) {
            if !globs.iter().any(|g| g.matches(&declaration.name)) {
                problems.push(Problem::warning(
                    ProblemCode::NoGroup,
                    format!("'{}' belongs to no group", declaration.name),
                    ctx.ast.node(declaration.node).span,
                ));
            }
        }
    }
}

/// Jobs listed in `passed:` must use the resource being fetched.
struct PassedInteraction;

impl DocumentRule for PassedInteraction {
    fn name(&self) -> &'static str {
        "passed-interaction"
    }

    fn check(&self, ctx: &RuleContext<'_>, problems: &mut Vec<Problem>) {
        let kinds: Vec<_> = ctx.schema.entity_kinds().collect();
        let find = |label: &str| kinds.iter().find(|(_, def)| def.label == label).map(|(k, _)| *k);
        let (Some(job_kind), Some(resource_kind)) = (find("Job"), find("Resource")) else {
            return;
        };
        let interactions = ctx.index.interactions(ctx.ast, job_kind, resource_kind);
        let ast = ctx.ast;
        for (node, ty) in &ctx.tree.types {
            if ctx.schema.type_name(*ty) != "GetStep" || !ast.is_mapping(*node) {
                continue;
            }
            let resource = ast
                .get_str(*node, "resource")
                .or_else(|| ast.get_str(*node, "get"));
            let Some(resource) = resource else {
                continue;
            };
            if ctx.index.resolve(resource_kind, resource).is_none() {
                continue;
            }
            let Some(passed) = ast.get(*node, "passed") else {
                continue;
            };
            for item in ast.items(ast.resolve(passed)) {
                let Some(job) = ast.scalar(ast.resolve(item.value)) else {
                    continue;
                };
                let Some(touched) = interactions.get(job) else {
                    continue;
                };
                if !touched.contains(resource) {
                    problems.push(Problem::error(
                        ProblemCode::NoInteraction,
                        format!("Job '{job}' does not interact with resource '{resource}'"),
                        ast.node(item.value).span,
                    ));
                }
            }
        }
    }
}
