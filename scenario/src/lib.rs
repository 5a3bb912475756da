use std::{
    collections::{HashMap, hash_map::Entry as MapEntry},
    fmt,
    sync::Arc,
};

use wiring_manifest::{Domain, Ident, OptionName};

pub mod graph;

/// Emitter-issued handle for a constructed native object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    id: Ident,
    class: Arc<str>,
}

impl Handle {
    pub fn new(id: Ident, class: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            class: class.into(),
        }
    }

    pub fn id(&self) -> &Ident {
        &self.id
    }

    /// Fully qualified native class, e.g. `dfplayer_pro::DFPlayerPro`.
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id.as_str())
    }
}

/// A reference a component was wired with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub option: OptionName,
    pub target: Ident,
    /// Passed to the constructor rather than applied through a setter.
    pub constructor: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedComponent {
    pub id: Ident,
    pub domain: Domain,
    pub handle: Handle,
    /// Constructor dependencies first, then optional references in application order.
    pub dependencies: Vec<Dependency>,
}

impl ResolvedComponent {
    pub fn constructor_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.constructor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Declared in this pass but not constructed yet.
    Pending,
    Resolved(Handle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Resolved(&'a Handle),
    Pending,
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("identifier `{0}` is already declared")]
    AlreadyDeclared(Ident),
    #[error("identifier `{0}` is already resolved")]
    AlreadyResolved(Ident),
}

impl TableError {
    pub fn ident(&self) -> &Ident {
        match self {
            TableError::AlreadyDeclared(id) | TableError::AlreadyResolved(id) => id,
        }
    }
}

/// Identifier to component lookup for a single wiring pass.
///
/// Every identifier is written at most twice: once as `Pending` when it is declared, and
/// once when its handle is published. Nothing is ever removed or overwritten.
#[derive(Clone, Debug, Default)]
pub struct IdentifierTable {
    entries: HashMap<Ident, Entry>,
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as declared but not yet constructed.
    pub fn reserve(&mut self, id: &Ident) -> Result<(), TableError> {
        match self.entries.entry(id.clone()) {
            MapEntry::Occupied(_) => Err(TableError::AlreadyDeclared(id.clone())),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::Pending);
                Ok(())
            }
        }
    }

    /// Record the handle for `id`. Reserving first is optional; resolving twice is not.
    pub fn publish(&mut self, handle: Handle) -> Result<(), TableError> {
        match self.entries.get_mut(handle.id().as_str()) {
            Some(Entry::Resolved(_)) => Err(TableError::AlreadyResolved(handle.id().clone())),
            Some(entry) => {
                *entry = Entry::Resolved(handle);
                Ok(())
            }
            None => {
                self.entries
                    .insert(handle.id().clone(), Entry::Resolved(handle));
                Ok(())
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Lookup<'_> {
        match self.entries.get(id) {
            Some(Entry::Resolved(handle)) => Lookup::Resolved(handle),
            Some(Entry::Pending) => Lookup::Pending,
            None => Lookup::Missing,
        }
    }

    pub fn is_resolved(&self, id: &str) -> bool {
        matches!(self.lookup(id), Lookup::Resolved(_))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only record of registered components; insertion order is setup order.
#[derive(Clone, Debug, Default)]
pub struct LifecycleRegistry {
    components: Vec<ResolvedComponent>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component and return its setup index.
    pub fn register(&mut self, component: ResolvedComponent) -> usize {
        self.components.push(component);
        self.components.len() - 1
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedComponent> {
        self.components.iter().find(|c| c.id.as_str() == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.components.iter().position(|c| c.id.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedComponent> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident {
        Ident::new(name).unwrap()
    }

    fn handle(name: &str) -> Handle {
        Handle::new(ident(name), "uart::UARTComponent")
    }

    #[test]
    fn reserve_then_publish() {
        let mut table = IdentifierTable::new();
        table.reserve(&ident("bus")).unwrap();
        assert_eq!(table.lookup("bus"), Lookup::Pending);

        table.publish(handle("bus")).unwrap();
        assert_eq!(table.lookup("bus"), Lookup::Resolved(&handle("bus")));
        assert_eq!(table.lookup("other"), Lookup::Missing);
    }

    #[test]
    fn duplicate_reserve_is_rejected() {
        let mut table = IdentifierTable::new();
        table.reserve(&ident("bus")).unwrap();
        assert_eq!(
            table.reserve(&ident("bus")),
            Err(TableError::AlreadyDeclared(ident("bus")))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn second_publish_keeps_first_handle() {
        let mut table = IdentifierTable::new();
        table.publish(handle("bus")).unwrap();

        let err = table
            .publish(Handle::new(ident("bus"), "time::RealTimeClock"))
            .unwrap_err();
        assert_eq!(err.ident().as_str(), "bus");

        let Lookup::Resolved(kept) = table.lookup("bus") else {
            panic!("bus should stay resolved");
        };
        assert_eq!(kept.class(), "uart::UARTComponent");
    }

    #[test]
    fn registry_preserves_insertion_order() {
        let mut registry = LifecycleRegistry::new();
        for (i, name) in ["b", "a", "c"].into_iter().enumerate() {
            let index = registry.register(ResolvedComponent {
                id: ident(name),
                domain: Domain::new("uart").unwrap(),
                handle: handle(name),
                dependencies: Vec::new(),
            });
            assert_eq!(index, i);
        }

        let order: Vec<&str> = registry.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, ["b", "a", "c"]);
        assert_eq!(registry.position("c"), Some(2));
        assert!(registry.get("missing").is_none());
    }
}
