#[cfg(test)]
mod tests;

use miette::Diagnostic;
use wiring_manifest::{Catalog, Document, Ident};
use wiring_scenario::{
    IdentifierTable, LifecycleRegistry, ResolvedComponent, graph::topo_order,
};

pub mod backend;
mod emit;
mod resolver;

pub use emit::{Arg, EmitError, Emitter};
pub use resolver::{
    Application, Error as ResolveError, Resolver, Unresolved, WiringPlan, WiringState,
};

/// Order in which declarations are wired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireOrder {
    /// Providers before the components that reference them, otherwise document order.
    #[default]
    Dependency,
    /// Strict document order; forward references fail.
    Declared,
}

#[derive(Clone, Copy, Debug, Default, bon::Builder)]
pub struct WireOptions {
    #[builder(default)]
    pub order: WireOrder,
}

#[allow(unused_assignments)]
#[derive(Debug, thiserror::Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] resolver::Error),

    #[error("reference cycle detected: {path}")]
    #[diagnostic(
        code(wiring::cycle_detected),
        help("break the cycle by removing one of the references")
    )]
    CycleDetected { path: String, cycle: Vec<Ident> },
}

/// The outcome of one wiring pass.
#[derive(Clone, Debug)]
pub struct WiredScenario {
    name: String,
    components: LifecycleRegistry,
}

impl WiredScenario {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components in setup order.
    pub fn components(&self) -> &LifecycleRegistry {
        &self.components
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedComponent> {
        self.components.get(id)
    }
}

#[derive(Clone, Debug)]
pub struct Compiler {
    catalog: Catalog,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Catalog::builtin())
    }
}

impl Compiler {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Construct, register and configure every declaration of `document` through `emitter`.
    pub fn wire<E: Emitter>(
        &self,
        document: &Document,
        opts: &WireOptions,
        emitter: E,
    ) -> Result<WiredScenario, Error> {
        let decls = document.declarations();

        let mut table = IdentifierTable::new();
        for decl in decls {
            table
                .reserve(decl.id())
                .map_err(|err| resolver::Error::DuplicateIdentifier {
                    id: err.ident().clone(),
                })?;
        }

        let order = match opts.order {
            WireOrder::Declared => (0..decls.len()).collect(),
            WireOrder::Dependency => topo_order(decls).map_err(|err| Error::CycleDetected {
                path: err
                    .cycle
                    .iter()
                    .map(Ident::as_str)
                    .collect::<Vec<_>>()
                    .join(" -> "),
                cycle: err.cycle,
            })?,
        };

        let mut resolver = Resolver::new(&self.catalog, emitter);
        for index in order {
            resolver.resolve(&decls[index], &mut table)?;
        }

        let components = resolver.into_registry();
        tracing::info!(
            document = document.name(),
            components = components.len(),
            order = ?opts.order,
            "wired components"
        );
        Ok(WiredScenario {
            name: document.name().to_string(),
            components,
        })
    }

    /// Wire without producing code, reporting the first error.
    pub fn check(&self, document: &Document, opts: &WireOptions) -> Result<WiredScenario, Error> {
        self.wire(document, opts, backend::RecordingEmitter::new())
    }
}
