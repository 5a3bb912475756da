#![allow(clippy::result_large_err)]

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::{
    ComponentDeclaration, Domain, Error as ManifestError, Ident, OptionName,
    schema::{Catalog, ComponentSchema, OptionKind, OptionSchema},
    value::{Action, Automation, Literal, LiteralKind, OptionValue},
};

/// A validated configuration document: declarations in document order.
#[derive(Clone, Debug)]
pub struct Document {
    name: Arc<str>,
    declarations: Vec<ComponentDeclaration>,
}

impl Document {
    pub fn new(name: impl Into<Arc<str>>, declarations: Vec<ComponentDeclaration>) -> Self {
        Self {
            name: name.into(),
            declarations,
        }
    }

    pub fn parse_named(
        name: impl AsRef<str>,
        source: Arc<str>,
        catalog: &Catalog,
    ) -> Result<Self, DocumentError> {
        let declarations = load(&source, catalog)
            .map_err(|kind| DocumentError::new(name.as_ref(), Arc::clone(&source), kind))?;
        tracing::debug!(
            document = name.as_ref(),
            declarations = declarations.len(),
            "loaded configuration"
        );
        Ok(Self::new(name.as_ref(), declarations))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declarations(&self) -> &[ComponentDeclaration] {
        &self.declarations
    }
}

#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DocumentError {
    pub kind: ManifestError,
    src: NamedSource<Arc<str>>,
    labels: Vec<LabeledSpan>,
}

impl DocumentError {
    pub fn new(name: impl AsRef<str>, source: Arc<str>, kind: ManifestError) -> Self {
        let labels = labels_for_error(&kind, &source);
        let src = NamedSource::new(name, source).with_language("yaml");
        Self { kind, src, labels }
    }
}

impl Diagnostic for DocumentError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.kind.code()
    }

    fn severity(&self) -> Option<miette::Severity> {
        self.kind.severity()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.kind.help()
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        (!self.labels.is_empty()).then(|| Box::new(self.labels.iter().cloned()) as _)
    }
}

struct RawInstance<'a> {
    schema: &'static ComponentSchema,
    id: Option<Ident>,
    entries: Vec<(&'a str, &'a Value)>,
}

fn load(source: &str, catalog: &Catalog) -> Result<Vec<ComponentDeclaration>, ManifestError> {
    let root: Value = serde_yaml::from_str(source)?;
    let root = match root {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(root) => root,
        other => {
            return Err(ManifestError::InvalidRoot {
                found: describe(&other),
            });
        }
    };

    let mut raw = Vec::new();
    let mut present = BTreeSet::new();
    for (key, value) in &root {
        let Some(domain) = key.as_str() else {
            return Err(ManifestError::InvalidRoot {
                found: "a non-string key",
            });
        };
        let Some(schema) = catalog.get(domain) else {
            return Err(ManifestError::UnknownDomain {
                domain: domain.to_string(),
                known: catalog.domain_names(),
            });
        };
        present.insert(schema.domain);

        match value {
            Value::Sequence(items) => {
                if !schema.multi {
                    return Err(ManifestError::MultipleInstances {
                        domain: domain.to_string(),
                    });
                }
                for item in items {
                    raw.push(read_instance(schema, item)?);
                }
            }
            item => raw.push(read_instance(schema, item)?),
        }
    }

    for domain in &present {
        let Some(schema) = catalog.get(domain) else {
            continue;
        };
        for dependency in schema.dependencies {
            if !present.contains(dependency) {
                return Err(ManifestError::MissingDomainDependency {
                    domain: domain.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }

    let declared = assign_ids(&raw);
    let mut class_of: HashMap<&str, &'static ComponentSchema> = HashMap::new();
    for (id, schema) in &declared {
        class_of.entry(id.as_str()).or_insert(*schema);
    }

    let mut out = Vec::with_capacity(raw.len());
    for (instance, (id, schema)) in raw.iter().zip(&declared) {
        let mut decl = ComponentDeclaration::new(id.clone(), Domain::new(schema.domain)?);

        for &(key, value) in &instance.entries {
            let Some(option) = schema.option(key) else {
                return Err(ManifestError::UnknownOption {
                    domain: schema.domain.to_string(),
                    id: id.to_string(),
                    option: key.to_string(),
                    known: schema.option_names(),
                });
            };
            let value = convert_value(id, option, value)?;
            if let (OptionKind::Reference { class }, OptionValue::Reference(target)) =
                (&option.kind, &value)
                && let Some(target_schema) = class_of.get(target.as_str())
                && !target_schema.is_a(class)
            {
                return Err(ManifestError::ReferenceTypeMismatch {
                    id: id.to_string(),
                    option: key.to_string(),
                    target: target.to_string(),
                    expected: class.to_string(),
                    actual: target_schema.qualified_class(),
                });
            }
            decl = decl.with_option(OptionName::new(key)?, value);
        }

        for option in schema.options().filter(|o| o.is_required()) {
            if decl.option(option.name).is_some() {
                continue;
            }
            let OptionKind::Reference { class } = option.kind else {
                return Err(ManifestError::MissingOption {
                    id: id.to_string(),
                    option: option.name.to_string(),
                });
            };
            let candidates: Vec<&Ident> = declared
                .iter()
                .filter(|(_, s)| s.is_a(class))
                .map(|(candidate, _)| candidate)
                .collect();
            match candidates.as_slice() {
                [only] => {
                    tracing::debug!(
                        component = %id,
                        option = option.name,
                        target = %only,
                        "defaulting reference to the only candidate"
                    );
                    decl = decl.with_option(
                        OptionName::new(option.name)?,
                        OptionValue::Reference((*only).clone()),
                    );
                }
                [] => {
                    return Err(ManifestError::MissingOption {
                        id: id.to_string(),
                        option: option.name.to_string(),
                    });
                }
                many => {
                    let names: Vec<&str> = many.iter().map(|c| c.as_str()).collect();
                    return Err(ManifestError::AmbiguousReference {
                        id: id.to_string(),
                        option: option.name.to_string(),
                        class: class.to_string(),
                        candidates: names.join(", "),
                    });
                }
            }
        }

        out.push(decl);
    }

    Ok(out)
}

fn read_instance<'a>(
    schema: &'static ComponentSchema,
    item: &'a Value,
) -> Result<RawInstance<'a>, ManifestError> {
    let mapping: Option<&Mapping> = match item {
        Value::Null => None,
        Value::Mapping(mapping) => Some(mapping),
        other => {
            return Err(ManifestError::InvalidInstance {
                domain: schema.domain.to_string(),
                found: describe(other),
            });
        }
    };

    let mut id = None;
    let mut platform = None;
    let mut entries = Vec::new();
    for (key, value) in mapping.into_iter().flatten() {
        let Some(key) = key.as_str() else {
            return Err(ManifestError::InvalidInstance {
                domain: schema.domain.to_string(),
                found: "a mapping with a non-string key",
            });
        };
        match key {
            "id" => {
                let Value::String(name) = value else {
                    return Err(ManifestError::InvalidOptionType {
                        id: schema.domain.to_string(),
                        option: "id".to_string(),
                        expected: "an identifier".to_string(),
                        found: describe(value),
                    });
                };
                id = Some(Ident::new(name.as_str())?);
            }
            "platform" if !schema.platforms.is_empty() => {
                platform = Some(value.as_str().unwrap_or_default());
            }
            _ => entries.push((key, value)),
        }
    }

    if !schema.platforms.is_empty() {
        let known = schema.platforms.join(", ");
        match platform {
            None => {
                return Err(ManifestError::MissingPlatform {
                    domain: schema.domain.to_string(),
                    known,
                });
            }
            Some(platform) if !schema.platforms.contains(&platform) => {
                return Err(ManifestError::UnknownPlatform {
                    domain: schema.domain.to_string(),
                    platform: platform.to_string(),
                    known,
                });
            }
            Some(_) => {}
        }
    }

    Ok(RawInstance {
        schema,
        id,
        entries,
    })
}

/// Give every instance an identifier, generating `<class>_id`, `<class>_id_2`, ...
/// for instances that did not declare one.
fn assign_ids(raw: &[RawInstance<'_>]) -> Vec<(Ident, &'static ComponentSchema)> {
    let mut taken: HashSet<String> = raw
        .iter()
        .filter_map(|r| r.id.as_ref().map(|id| id.to_string()))
        .collect();

    raw.iter()
        .map(|r| {
            let id = r.id.clone().unwrap_or_else(|| {
                let base = format!("{}_id", r.schema.class.to_ascii_lowercase());
                let mut candidate = base.clone();
                let mut n = 2;
                while taken.contains(&candidate) {
                    candidate = format!("{base}_{n}");
                    n += 1;
                }
                taken.insert(candidate.clone());
                Ident::new(candidate).expect("class names are valid identifiers")
            });
            (id, r.schema)
        })
        .collect()
}

fn convert_value(
    id: &Ident,
    option: &OptionSchema,
    value: &Value,
) -> Result<OptionValue, ManifestError> {
    let mismatch = || ManifestError::InvalidOptionType {
        id: id.to_string(),
        option: option.name.to_string(),
        expected: option.kind.to_string(),
        found: describe(value),
    };

    match option.kind {
        OptionKind::Literal { literal } => {
            let literal = match (literal, value) {
                (LiteralKind::Bool, Value::Bool(v)) => Literal::Bool(*v),
                (LiteralKind::Int, Value::Number(n)) => Literal::Int(n.as_i64().ok_or_else(mismatch)?),
                (LiteralKind::Float, Value::Number(n)) => {
                    Literal::Float(n.as_f64().ok_or_else(mismatch)?)
                }
                (LiteralKind::String, Value::String(s)) => Literal::String(s.clone()),
                _ => return Err(mismatch()),
            };
            Ok(OptionValue::Literal(literal))
        }
        OptionKind::Reference { .. } => match value {
            Value::String(target) => Ok(OptionValue::Reference(Ident::new(target.as_str())?)),
            _ => Err(mismatch()),
        },
        OptionKind::Automation { .. } => {
            let actions = match value {
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| convert_action(id, option, item))
                    .collect::<Result<Vec<_>, _>>()?,
                Value::Mapping(_) => vec![convert_action(id, option, value)?],
                _ => return Err(mismatch()),
            };
            Ok(OptionValue::Automation(Automation { actions }))
        }
    }
}

fn convert_action(id: &Ident, option: &OptionSchema, item: &Value) -> Result<Action, ManifestError> {
    let invalid = |message: &str| ManifestError::InvalidAction {
        id: id.to_string(),
        option: option.name.to_string(),
        message: message.to_string(),
    };

    let Value::Mapping(mapping) = item else {
        return Err(invalid("each action must be a mapping"));
    };
    let mut entries = mapping.iter();
    let (Some((name, value)), None) = (entries.next(), entries.next()) else {
        return Err(invalid("each action must have exactly one key"));
    };
    let Some(name) = name.as_str() else {
        return Err(invalid("action names must be strings"));
    };

    match name {
        "lambda" => value
            .as_str()
            .map(|code| Action::Lambda(code.trim_end().to_string()))
            .ok_or_else(|| invalid("`lambda` expects a string of C++ code")),
        "delay" => {
            let millis = match value {
                Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
                Value::String(s) => parse_duration_millis(s),
                _ => None,
            };
            millis
                .map(|millis| Action::Delay { millis })
                .ok_or_else(|| invalid("`delay` expects milliseconds or a duration like `500ms`"))
        }
        "logger.log" => value
            .as_str()
            .map(|message| Action::LoggerLog(message.to_string()))
            .ok_or_else(|| invalid("`logger.log` expects a message string")),
        other => Err(ManifestError::UnknownAction {
            id: id.to_string(),
            option: option.name.to_string(),
            action: other.to_string(),
        }),
    }
}

fn parse_duration_millis(input: &str) -> Option<u32> {
    let input = input.trim();
    if let Some(ms) = input.strip_suffix("ms") {
        return ms.trim().parse().ok();
    }
    if let Some(secs) = input.strip_suffix('s') {
        return secs.trim().parse::<u32>().ok()?.checked_mul(1000);
    }
    input.parse().ok()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn labels_for_error(err: &ManifestError, source: &str) -> Vec<LabeledSpan> {
    let (span, label) = match err {
        ManifestError::Yaml(e) => {
            let Some(location) = e.location() else {
                return Vec::new();
            };
            let offset = location.index().min(source.len());
            let len = usize::from(offset < source.len());
            (Some((offset, len).into()), "here".to_string())
        }
        ManifestError::UnknownDomain { domain, .. } => {
            (find_key(source, domain), "unknown domain".to_string())
        }
        ManifestError::MultipleInstances { domain }
        | ManifestError::MissingPlatform { domain, .. }
        | ManifestError::MissingDomainDependency { domain, .. } => {
            (find_key(source, domain), "declared here".to_string())
        }
        ManifestError::UnknownPlatform { platform, .. } => {
            (find_token(source, platform), "unknown platform".to_string())
        }
        ManifestError::UnknownOption { option, .. } => {
            (find_key(source, option), "unknown option".to_string())
        }
        ManifestError::InvalidOptionType { option, expected, .. } => {
            (find_key(source, option), format!("expected {expected}"))
        }
        ManifestError::ReferenceTypeMismatch {
            option, expected, ..
        } => (find_key(source, option), format!("must reference a {expected}")),
        ManifestError::UnknownAction { action, .. } => {
            (find_key(source, action), "unknown action".to_string())
        }
        _ => (None, String::new()),
    };

    span.map(|span| vec![LabeledSpan::new_primary_with_span(Some(label), span)])
        .unwrap_or_default()
}

/// Locate `key:` in the source, returning the span of the key.
fn find_key(source: &str, key: &str) -> Option<SourceSpan> {
    token_offsets(source, key)
        .find(|&start| source[start + key.len()..].trim_start_matches(' ').starts_with(':'))
        .map(|start| (start, key.len()).into())
}

fn find_token(source: &str, token: &str) -> Option<SourceSpan> {
    token_offsets(source, token)
        .next()
        .map(|start| (start, token.len()).into())
}

fn token_offsets<'a>(source: &'a str, token: &'a str) -> impl Iterator<Item = usize> + 'a {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.';
    source.match_indices(token).filter_map(move |(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + token.len()..].chars().next();
        let bounded = !before.is_some_and(is_word) && !after.is_some_and(is_word);
        bounded.then_some(start)
    })
}
