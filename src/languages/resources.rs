//! `source:` schemas of the built-in resource types.

use super::Common;
use crate::schema::value::{
    DurationParser, EnumParser, GithubUriCompleter, GithubUriParser, RegexParser, TimeParser,
};
use crate::schema::{BeanType, Constraint, Dispatch, Property, ScalarType, SchemaBuilder, TypeId};

pub const BUILTIN_TYPES: &[&str] = &[
    "git",
    "time",
    "pool",
    "semver",
    "s3",
    "registry-image",
    "docker-image",
    "cf",
    "bosh-io-release",
    "bosh-io-stemcell",
    "tracker",
    "hg",
    "github-release",
    "mock",
];

fn p(name: &str, ty: TypeId) -> Property {
    Property::new(name, ty)
}

fn git(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let uri = b.scalar(
        "Git URI",
        ScalarType::parsed(GithubUriParser).with_completer(GithubUriCompleter),
    );
    let regex = b.scalar("Regex", ScalarType::parsed(RegexParser));
    let git_config = b.bean(
        "GitConfigEntry",
        BeanType::new()
            .prop(p("name", c.string).required())
            .prop(p("value", c.string).required()),
    );
    let git_configs = b.seq(git_config);
    let credential = b.bean(
        "SubmoduleCredential",
        BeanType::new()
            .prop(p("host", c.string).required())
            .prop(p("username", c.string).required())
            .prop(p("password", c.string).required()),
    );
    let credentials = b.seq(credential);
    b.bean(
        "GitSource",
        BeanType::new()
            .prop(
                p("uri", uri)
                    .required()
                    .describe("The location of the repository."),
            )
            .props([
                p("branch", c.string).describe(
                    "The branch to track. Optional if the repository has a default branch.",
                ),
                p("private_key", c.string).describe("Private key to use when pulling or pushing."),
                p("username", c.string),
                p("password", c.string),
                p("paths", c.strings)
                    .describe("If specified, only changes to the listed paths produce new versions."),
                p("ignore_paths", c.strings),
                p("skip_ssl_verification", c.boolean),
                p("tag_filter", c.string),
                p("tag_regex", regex),
                p("fetch_tags", c.boolean),
                p("git_config", git_configs),
                p("submodule_credentials", credentials),
                p("disable_ci_skip", c.boolean),
                p("commit_verification_keys", c.strings),
                p("commit_verification_key_ids", c.strings),
                p("gpg_keyserver", c.string),
                p("git_crypt_key", c.string),
                p("https_tunnel", c.params),
                p("commit_filter", c.params),
                p("version_depth", c.positive),
                p("search_remote_refs", c.boolean),
            ]),
    )
}

fn time(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let clock = b.scalar("Time", ScalarType::parsed(TimeParser));
    let day = b.scalar(
        "Day",
        ScalarType::parsed(EnumParser::new(
            "Day",
            &[
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday",
            ],
        )),
    );
    let days = b.seq(day);
    b.bean(
        "TimeSource",
        BeanType::new()
            .props([
                p("interval", c.duration).describe("Emit a new version at least this often."),
                p("location", c.string)
                    .describe("Timezone for `start`, `stop` and `days`, e.g. `America/New_York`."),
                p("start", clock),
                p("stop", clock),
                p("days", days),
                p("initial_version", c.boolean),
            ])
            .constraint(Constraint::implies("start", "stop"))
            .constraint(Constraint::implies("stop", "start")),
    )
}

fn pool(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let retry = b.scalar("Duration", ScalarType::parsed(DurationParser::new()));
    b.bean(
        "PoolSource",
        BeanType::new()
            .prop(p("uri", c.string).required().describe("The repository holding the pool."))
            .prop(p("branch", c.string).required())
            .prop(
                p("pool", c.string)
                    .required()
                    .describe("The directory in the repository where the locks live."),
            )
            .props([
                p("private_key", c.string),
                p("username", c.string),
                p("password", c.string),
                p("retry_delay", retry),
            ]),
    )
}

fn semver(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let driver = b.scalar(
        "Semver Driver",
        ScalarType::parsed(EnumParser::new("Semver Driver", &["s3", "git", "swift", "gcs"])),
    );
    let common = |c: &Common| {
        [
            p("driver", driver).describe("Storage for the version number. Defaults to `s3`."),
            p("initial_version", c.string),
        ]
    };
    let s3 = b.bean(
        "SemverS3Source",
        BeanType::new()
            .props(common(c))
            .prop(p("bucket", c.string).required())
            .prop(p("key", c.string).required())
            .props([
                p("access_key_id", c.string),
                p("secret_access_key", c.string),
                p("session_token", c.string),
                p("region_name", c.string),
                p("endpoint", c.string),
                p("disable_ssl", c.boolean),
                p("skip_ssl_verification", c.boolean),
                p("server_side_encryption", c.string),
                p("use_v2_signing", c.boolean),
            ]),
    );
    let git = b.bean(
        "SemverGitSource",
        BeanType::new()
            .props(common(c))
            .prop(p("uri", c.string).required())
            .prop(p("branch", c.string).required())
            .prop(p("file", c.string).required())
            .props([
                p("private_key", c.string),
                p("username", c.string),
                p("password", c.string),
                p("git_user", c.string),
                p("depth", c.positive),
                p("skip_ssl_verification", c.boolean),
                p("commit_message", c.string),
            ]),
    );
    let swift = b.bean(
        "SemverSwiftSource",
        BeanType::new()
            .props(common(c))
            .prop(p("openstack", c.params).required()),
    );
    let gcs = b.bean(
        "SemverGcsSource",
        BeanType::new()
            .props(common(c))
            .prop(p("bucket", c.string).required())
            .prop(p("key", c.string).required())
            .prop(p("json_key", c.string).required()),
    );
    b.union(
        "SemverSource",
        vec![s3, git, swift, gcs],
        Dispatch::Field {
            key: "driver".to_string(),
            from_parent: false,
            shadowable: false,
            default: Some("s3".to_string()),
            cases: vec![
                ("s3".to_string(), s3),
                ("git".to_string(), git),
                ("swift".to_string(), swift),
                ("gcs".to_string(), gcs),
            ],
            fallback: s3,
        },
    )
}

fn s3(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let regex = b.scalar("Regex", ScalarType::parsed(RegexParser));
    b.bean(
        "S3Source",
        BeanType::new()
            .prop(p("bucket", c.string).required())
            .props([
                p("regexp", regex).describe("Pattern matching versioned file names."),
                p("versioned_file", c.string),
                p("access_key_id", c.string),
                p("secret_access_key", c.string),
                p("session_token", c.string),
                p("aws_role_arn", c.string),
                p("region_name", c.string),
                p("private", c.boolean),
                p("cloudfront_url", c.string),
                p("endpoint", c.string),
                p("disable_ssl", c.boolean),
                p("skip_ssl_verification", c.boolean),
                p("skip_download", c.boolean),
                p("server_side_encryption", c.string),
                p("sse_kms_key_id", c.string),
                p("use_v2_signing", c.boolean),
                p("disable_multipart", c.boolean),
                p("initial_path", c.string),
                p("initial_version", c.string),
                p("initial_content_text", c.string),
                p("initial_content_binary", c.string),
            ])
            .constraint(Constraint::require_one_of(&["regexp", "versioned_file"]))
            .constraint(Constraint::only_one_of(&["regexp", "versioned_file"])),
    )
}

fn registry_image(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    b.bean(
        "RegistryImageSource",
        BeanType::new()
            .prop(
                p("repository", c.string)
                    .required()
                    .describe("The URI of the image repository, e.g. `alpine`."),
            )
            .props([
                p("tag", c.string).describe("Tag to track. Defaults to `latest`."),
                p("username", c.string),
                p("password", c.string),
                p("aws_access_key_id", c.string),
                p("aws_secret_access_key", c.string),
                p("aws_session_token", c.string),
                p("aws_region", c.string),
                p("aws_role_arn", c.string),
                p("insecure", c.boolean),
                p("debug", c.boolean),
                p("variant", c.string),
                p("semver_constraint", c.string),
                p("content_trust", c.params),
                p("registry_mirror", c.params),
                p("ca_certs", c.strings),
            ]),
    )
}

fn docker_image(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    b.bean(
        "DockerImageSource",
        BeanType::new()
            .prop(p("repository", c.string).required())
            .props([
                p("tag", c.string),
                p("username", c.string),
                p("password", c.string),
                p("aws_access_key_id", c.string),
                p("aws_secret_access_key", c.string),
                p("aws_session_token", c.string),
                p("insecure_registries", c.strings),
                p("registry_mirror", c.string),
                p("ca_certs", c.any),
                p("client_certs", c.any),
                p("max_concurrent_downloads", c.positive),
                p("max_concurrent_uploads", c.positive),
            ]),
    )
}

/// `source:` typed by the `type:` of the enclosing resource. Types the
/// document defines itself are left unchecked.
pub fn source(b: &mut SchemaBuilder, c: &Common) -> TypeId {
    let cases = vec![
        ("git".to_string(), git(b, c)),
        ("time".to_string(), time(b, c)),
        ("pool".to_string(), pool(b, c)),
        ("semver".to_string(), semver(b, c)),
        ("s3".to_string(), s3(b, c)),
        ("registry-image".to_string(), registry_image(b, c)),
        ("docker-image".to_string(), docker_image(b, c)),
    ];
    b.union(
        "ResourceSource",
        cases.iter().map(|(_, ty)| *ty).collect(),
        Dispatch::Field {
            key: "type".to_string(),
            from_parent: true,
            shadowable: true,
            default: None,
            cases,
            fallback: c.params,
        },
    )
}
