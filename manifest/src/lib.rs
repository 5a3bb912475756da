//! Component declarations, the schema catalog they are validated against, and the YAML
//! configuration loader.

mod declaration;
mod document;
mod error;
mod names;
pub mod schema;
mod value;

pub use declaration::{ComponentDeclaration, DeclaredOption};
pub use document::{Document, DocumentError};
pub use error::Error;
pub use names::{Domain, Ident, OptionName};
pub use schema::{
    COMPONENT_OPTIONS, Catalog, ComponentSchema, OptionKind, OptionSchema, Presence, Stage,
    TriggerArg,
};
pub use value::{Action, Automation, Literal, LiteralKind, OptionValue};
