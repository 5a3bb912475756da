use std::{collections::HashMap, fmt};

use miette::Diagnostic;
use thiserror::Error;
use wiring_manifest::{
    Catalog, ComponentDeclaration, ComponentSchema, Domain, Ident, Literal, LiteralKind,
    OptionKind, OptionName, OptionSchema, OptionValue, Stage,
};
use wiring_scenario::{
    Dependency, Handle, IdentifierTable, LifecycleRegistry, Lookup, ResolvedComponent,
};

use crate::emit::{Arg, EmitError, Emitter};

/// Why a referenced identifier could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unresolved {
    /// Nothing with this identifier is declared.
    Missing,
    /// Declared, but not constructed yet.
    Pending,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unresolved::Missing => "is not declared",
            Unresolved::Pending => "has not been constructed yet",
        })
    }
}

#[allow(unused_assignments)]
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error("`{id}` has unknown component type `{domain}`")]
    #[diagnostic(code(wiring::unknown_component_type))]
    UnknownComponentType { id: Ident, domain: Domain },

    #[error("`{id}` option `{option}` references `{target}`, which {reason}")]
    #[diagnostic(
        code(wiring::unresolved_dependency),
        help("declare `{target}` before the components that reference it")
    )]
    UnresolvedDependency {
        id: Ident,
        option: OptionName,
        target: Ident,
        reason: Unresolved,
    },

    #[error("identifier `{id}` is declared more than once")]
    #[diagnostic(code(wiring::duplicate_identifier))]
    DuplicateIdentifier { id: Ident },

    #[error("`{id}` option `{option}` expects {expected}, found {found}")]
    #[diagnostic(code(wiring::invalid_option_type))]
    InvalidOptionType {
        id: Ident,
        option: OptionName,
        expected: String,
        found: String,
    },

    #[error("`{id}` has unknown option `{option}`")]
    #[diagnostic(code(wiring::unknown_option))]
    UnknownOption { id: Ident, option: OptionName },

    #[error("`{id}` is missing required option `{option}`")]
    #[diagnostic(code(wiring::missing_option))]
    MissingOption { id: Ident, option: String },

    #[error("failed to emit `{id}`")]
    #[diagnostic(code(wiring::emit))]
    Emit {
        id: Ident,
        #[source]
        source: EmitError,
    },
}

impl Error {
    /// The declaration the error was raised for.
    pub fn id(&self) -> &Ident {
        match self {
            Error::UnknownComponentType { id, .. }
            | Error::UnresolvedDependency { id, .. }
            | Error::DuplicateIdentifier { id }
            | Error::InvalidOptionType { id, .. }
            | Error::UnknownOption { id, .. }
            | Error::MissingOption { id, .. }
            | Error::Emit { id, .. } => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WiringState {
    Declared,
    ConstructorDepsResolving,
    Constructed,
    Registered,
    OptionsApplying,
    Ready,
    Failed(String),
}

impl WiringState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WiringState::Ready | WiringState::Failed(_))
    }

    pub fn can_advance_to(&self, next: &WiringState) -> bool {
        use WiringState::*;
        match (self, next) {
            (Declared, ConstructorDepsResolving)
            | (ConstructorDepsResolving, Constructed)
            | (Constructed, Registered)
            | (Registered, OptionsApplying)
            | (OptionsApplying, Ready) => true,
            (current, Failed(_)) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// An option applied after registration.
#[derive(Clone, Copy, Debug)]
pub struct Application<'d> {
    pub seq: usize,
    pub schema: &'static OptionSchema,
    pub name: &'d OptionName,
    pub value: &'d OptionValue,
}

/// How one declaration will be built: constructor arguments in schema order, then the
/// remaining options in declaration order.
#[derive(Clone, Debug)]
pub struct WiringPlan<'d> {
    pub schema: &'static ComponentSchema,
    pub constructor: Vec<(&'d OptionName, &'d OptionValue)>,
    pub applications: Vec<Application<'d>>,
}

impl<'d> WiringPlan<'d> {
    pub fn build(catalog: &Catalog, decl: &'d ComponentDeclaration) -> Result<Self, Error> {
        let id = decl.id();
        let Some(schema) = catalog.get(decl.domain().as_str()) else {
            return Err(Error::UnknownComponentType {
                id: id.clone(),
                domain: decl.domain().clone(),
            });
        };

        let mut applications = Vec::new();
        for option in decl.options() {
            let Some(option_schema) = schema.option(option.name().as_str()) else {
                return Err(Error::UnknownOption {
                    id: id.clone(),
                    option: option.name().clone(),
                });
            };
            if !option_schema.kind.accepts(option.value()) {
                return Err(invalid_type(
                    id,
                    option.name(),
                    &option_schema.kind,
                    option.value().describe(),
                ));
            }
            if option_schema.stage != Stage::Constructor {
                applications.push(Application {
                    seq: option.seq(),
                    schema: option_schema,
                    name: option.name(),
                    value: option.value(),
                });
            }
        }
        applications.sort_by_key(|a| a.seq);

        let mut constructor = Vec::new();
        for option_schema in schema.constructor_options() {
            match decl.option(option_schema.name) {
                Some(option) => constructor.push((option.name(), option.value())),
                None if option_schema.is_required() => {
                    return Err(Error::MissingOption {
                        id: id.clone(),
                        option: option_schema.name.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(Self {
            schema,
            constructor,
            applications,
        })
    }

    /// Every reference the plan needs, constructor arguments first.
    pub fn references(&self) -> impl Iterator<Item = (&'d OptionName, &'d Ident, bool)> + '_ {
        let constructor = self
            .constructor
            .iter()
            .filter_map(|&(name, value)| value.as_reference().map(|target| (name, target, true)));
        let applied = self
            .applications
            .iter()
            .filter_map(|a| a.value.as_reference().map(|target| (a.name, target, false)));
        constructor.chain(applied)
    }
}

/// Wires declarations one at a time, driving an [`Emitter`] and recording each
/// constructed component in a [`LifecycleRegistry`].
pub struct Resolver<'a, E> {
    catalog: &'a Catalog,
    emitter: E,
    registry: LifecycleRegistry,
    states: HashMap<Ident, WiringState>,
}

impl<'a, E: Emitter> Resolver<'a, E> {
    pub fn new(catalog: &'a Catalog, emitter: E) -> Self {
        Self {
            catalog,
            emitter,
            registry: LifecycleRegistry::new(),
            states: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &LifecycleRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> LifecycleRegistry {
        self.registry
    }

    pub fn state_of(&self, id: &str) -> Option<&WiringState> {
        self.states.get(id)
    }

    /// Construct, register and configure one declaration.
    ///
    /// Every reference is checked before anything is emitted, so a declaration that fails
    /// on a reference leaves no construction or registration behind.
    pub fn resolve(
        &mut self,
        decl: &ComponentDeclaration,
        table: &mut IdentifierTable,
    ) -> Result<ResolvedComponent, Error> {
        let id = decl.id();
        if table.is_resolved(id.as_str()) || self.states.contains_key(id.as_str()) {
            return Err(Error::DuplicateIdentifier { id: id.clone() });
        }

        self.states.insert(id.clone(), WiringState::Declared);
        tracing::debug!(component = %id, domain = %decl.domain(), "wiring declaration");

        match self.wire(decl, table) {
            Ok(component) => Ok(component),
            Err(err) => {
                self.advance(id, WiringState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn wire(
        &mut self,
        decl: &ComponentDeclaration,
        table: &mut IdentifierTable,
    ) -> Result<ResolvedComponent, Error> {
        let id = decl.id();
        let plan = WiringPlan::build(self.catalog, decl)?;

        self.advance(id, WiringState::ConstructorDepsResolving);
        let mut dependencies = Vec::new();
        for (option, target, constructor) in plan.references() {
            let handle = lookup_handle(table, id, option, target)?;
            if let Some(option_schema) = plan.schema.option(option.as_str())
                && let OptionKind::Reference { class } = option_schema.kind
                && !self.provides(handle, class)
            {
                return Err(invalid_type(
                    id,
                    option,
                    &option_schema.kind,
                    format!("a reference to `{target}`, a {}", handle.class()),
                ));
            }
            dependencies.push(Dependency {
                option: option.clone(),
                target: target.clone(),
                constructor,
            });
        }

        let mut args = Vec::with_capacity(plan.constructor.len());
        for &(option, value) in &plan.constructor {
            args.push(arg_for(table, id, option, value, None)?);
        }

        let emit = |source| Error::Emit {
            id: id.clone(),
            source,
        };

        let handle = self
            .emitter
            .construct(id, plan.schema, &args)
            .map_err(emit)?;
        self.advance(id, WiringState::Constructed);

        self.emitter.register_lifecycle(&handle).map_err(emit)?;
        let component = ResolvedComponent {
            id: id.clone(),
            domain: decl.domain().clone(),
            handle: handle.clone(),
            dependencies,
        };
        self.registry.register(component.clone());
        table
            .publish(handle.clone())
            .map_err(|err| Error::DuplicateIdentifier {
                id: err.ident().clone(),
            })?;
        self.advance(id, WiringState::Registered);

        self.advance(id, WiringState::OptionsApplying);
        for application in &plan.applications {
            match application.schema.stage {
                Stage::Trigger(getter) => {
                    let (OptionKind::Automation { args }, OptionValue::Automation(automation)) =
                        (application.schema.kind, application.value)
                    else {
                        return Err(invalid_type(
                            id,
                            application.name,
                            &application.schema.kind,
                            application.value.describe(),
                        ));
                    };
                    self.emitter
                        .build_automation(&handle, getter, args, &automation.actions)
                        .map_err(emit)?;
                }
                Stage::Setter(setter) => {
                    let arg = arg_for(
                        table,
                        id,
                        application.name,
                        application.value,
                        Some(&application.schema.kind),
                    )?;
                    self.emitter
                        .call_setter(&handle, setter, &arg)
                        .map_err(emit)?;
                }
                // Constructor options never reach the application list.
                Stage::Constructor => {}
            }
        }
        self.advance(id, WiringState::Ready);

        Ok(component)
    }

    /// Whether the component behind `handle` can stand in for `class`.
    fn provides(&self, handle: &Handle, class: &str) -> bool {
        let schema = self
            .registry
            .get(handle.id().as_str())
            .and_then(|component| self.catalog.get(component.domain.as_str()));
        match schema {
            Some(schema) => schema.is_a(class),
            None => handle.class() == class,
        }
    }

    fn advance(&mut self, id: &Ident, next: WiringState) {
        let Some(state) = self.states.get_mut(id.as_str()) else {
            return;
        };
        debug_assert!(
            state.can_advance_to(&next),
            "invalid wiring transition for `{id}`: {state:?} -> {next:?}"
        );
        tracing::debug!(component = %id, from = ?state, to = ?next, "wiring state");
        *state = next;
    }
}

fn lookup_handle<'t>(
    table: &'t IdentifierTable,
    id: &Ident,
    option: &OptionName,
    target: &Ident,
) -> Result<&'t Handle, Error> {
    let reason = match table.lookup(target.as_str()) {
        Lookup::Resolved(handle) => return Ok(handle),
        Lookup::Pending => Unresolved::Pending,
        Lookup::Missing => Unresolved::Missing,
    };
    Err(Error::UnresolvedDependency {
        id: id.clone(),
        option: option.clone(),
        target: target.clone(),
        reason,
    })
}

/// Turn an option value into an emitter argument, resolving references against `table`.
fn arg_for(
    table: &IdentifierTable,
    id: &Ident,
    option: &OptionName,
    value: &OptionValue,
    kind: Option<&OptionKind>,
) -> Result<Arg, Error> {
    match value {
        OptionValue::Reference(target) => {
            lookup_handle(table, id, option, target).map(|handle| Arg::Handle(handle.clone()))
        }
        OptionValue::Literal(Literal::Int(v))
            if matches!(
                kind,
                Some(OptionKind::Literal {
                    literal: LiteralKind::Float
                })
            ) =>
        {
            Ok(Arg::Literal(Literal::Float(*v as f64)))
        }
        OptionValue::Literal(literal) => Ok(Arg::Literal(literal.clone())),
        OptionValue::Automation(_) => Err(Error::InvalidOptionType {
            id: id.clone(),
            option: option.clone(),
            expected: kind.map_or_else(|| "a value".to_string(), ToString::to_string),
            found: value.describe().into(),
        }),
    }
}

fn invalid_type(
    id: &Ident,
    option: &OptionName,
    kind: &OptionKind,
    found: impl Into<String>,
) -> Error {
    Error::InvalidOptionType {
        id: id.clone(),
        option: option.clone(),
        expected: kind.to_string(),
        found: found.into(),
    }
}
