use miette::Diagnostic;
use thiserror::Error;

#[allow(unused_assignments)]
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid yaml: {0}")]
    #[diagnostic(code(manifest::yaml_error))]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid {kind} name `{name}`: {reason}")]
    #[diagnostic(code(manifest::invalid_name))]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("configuration root must be a mapping of component domains, found {found}")]
    #[diagnostic(code(manifest::invalid_root))]
    InvalidRoot { found: &'static str },

    #[error("unknown component domain `{domain}`")]
    #[diagnostic(code(manifest::unknown_domain), help("known domains: {known}"))]
    UnknownDomain { domain: String, known: String },

    #[error("`{domain}` accepts a single instance, found a list")]
    #[diagnostic(
        code(manifest::multiple_instances),
        help("write the instance as a mapping instead of a list")
    )]
    MultipleInstances { domain: String },

    #[error("invalid `{domain}` entry: expected a mapping, found {found}")]
    #[diagnostic(code(manifest::invalid_instance))]
    InvalidInstance { domain: String, found: &'static str },

    #[error("`{domain}` entry is missing `platform`")]
    #[diagnostic(code(manifest::missing_platform), help("supported platforms: {known}"))]
    MissingPlatform { domain: String, known: String },

    #[error("unknown `{domain}` platform `{platform}`")]
    #[diagnostic(code(manifest::unknown_platform), help("supported platforms: {known}"))]
    UnknownPlatform {
        domain: String,
        platform: String,
        known: String,
    },

    #[error("`{id}` has unknown option `{option}` for domain `{domain}`")]
    #[diagnostic(code(manifest::unknown_option), help("valid options: {known}"))]
    UnknownOption {
        domain: String,
        id: String,
        option: String,
        known: String,
    },

    #[error("`{id}` option `{option}` expects {expected}, found {found}")]
    #[diagnostic(code(manifest::invalid_option_type))]
    InvalidOptionType {
        id: String,
        option: String,
        expected: String,
        found: &'static str,
    },

    #[error("`{id}` is missing required option `{option}`")]
    #[diagnostic(code(manifest::missing_option))]
    MissingOption { id: String, option: String },

    #[error("`{id}` option `{option}` must name one of several `{class}` instances")]
    #[diagnostic(
        code(manifest::ambiguous_reference),
        help("candidates: {candidates}")
    )]
    AmbiguousReference {
        id: String,
        option: String,
        class: String,
        candidates: String,
    },

    #[error("`{id}` option `{option}` references `{target}`, a {actual} (expected {expected})")]
    #[diagnostic(code(manifest::reference_type_mismatch))]
    ReferenceTypeMismatch {
        id: String,
        option: String,
        target: String,
        expected: String,
        actual: String,
    },

    #[error("`{domain}` requires the `{dependency}` domain to be configured")]
    #[diagnostic(code(manifest::missing_domain_dependency))]
    MissingDomainDependency { domain: String, dependency: String },

    #[error("`{id}` option `{option}` uses unknown action `{action}`")]
    #[diagnostic(
        code(manifest::unknown_action),
        help("supported actions: lambda, delay, logger.log")
    )]
    UnknownAction {
        id: String,
        option: String,
        action: String,
    },

    #[error("`{id}` option `{option}` has an invalid action: {message}")]
    #[diagnostic(code(manifest::invalid_action))]
    InvalidAction {
        id: String,
        option: String,
        message: String,
    },
}
