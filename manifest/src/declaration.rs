use crate::{
    names::{Domain, Ident, OptionName},
    value::OptionValue,
};

/// One option as written by the user, with its position in the declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct DeclaredOption {
    seq: usize,
    name: OptionName,
    value: OptionValue,
}

impl DeclaredOption {
    /// Position within the declaration; setters are applied in ascending order.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn name(&self) -> &OptionName {
        &self.name
    }

    pub fn value(&self) -> &OptionValue {
        &self.value
    }
}

/// A parsed description of one component instance to be built.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDeclaration {
    id: Ident,
    domain: Domain,
    options: Vec<DeclaredOption>,
}

impl ComponentDeclaration {
    pub fn new(id: Ident, domain: Domain) -> Self {
        Self {
            id,
            domain,
            options: Vec::new(),
        }
    }

    /// Append an option; it is applied after every option added before it.
    pub fn with_option(mut self, name: OptionName, value: impl Into<OptionValue>) -> Self {
        let seq = self.options.last().map_or(0, |o| o.seq + 1);
        self.options.push(DeclaredOption {
            seq,
            name,
            value: value.into(),
        });
        self
    }

    pub fn id(&self) -> &Ident {
        &self.id
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Options in sequence order.
    pub fn options(&self) -> &[DeclaredOption] {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&DeclaredOption> {
        self.options.iter().find(|o| o.name.as_str() == name)
    }

    /// Every `(option, target)` pair whose value is a reference.
    pub fn references(&self) -> impl Iterator<Item = (&OptionName, &Ident)> {
        self.options
            .iter()
            .filter_map(|o| o.value.as_reference().map(|target| (&o.name, target)))
    }
}
