use miette::Diagnostic;
use thiserror::Error;
use wiring_manifest::{Action, ComponentSchema, Ident, Literal, TriggerArg};
use wiring_scenario::Handle;

/// A value handed to a constructor or setter.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Literal(Literal),
    /// A component constructed earlier in the same pass.
    Handle(Handle),
}

#[allow(unused_assignments)]
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum EmitError {
    #[error("component `{id}` was already constructed")]
    #[diagnostic(code(emit::already_constructed))]
    AlreadyConstructed { id: Ident },

    #[error("component `{id}` clashes with a generated name")]
    #[diagnostic(
        code(emit::name_clash),
        help("pick an id that does not collide with generated automation names")
    )]
    NameClash { id: Ident },

    #[error("no component has been constructed for handle `{id}`")]
    #[diagnostic(code(emit::unknown_handle))]
    UnknownHandle { id: Ident },

    #[error("emitter error: {0}")]
    #[diagnostic(code(emit::error))]
    Other(String),
}

/// The collaborator that turns wiring decisions into native construction calls.
///
/// Calls arrive in the order the native program must perform them. A handle is only ever
/// passed back to the emitter that issued it.
pub trait Emitter {
    fn construct(
        &mut self,
        id: &Ident,
        schema: &ComponentSchema,
        args: &[Arg],
    ) -> Result<Handle, EmitError>;

    fn register_lifecycle(&mut self, handle: &Handle) -> Result<(), EmitError>;

    fn call_setter(&mut self, handle: &Handle, setter: &str, value: &Arg)
    -> Result<(), EmitError>;

    /// Attach `actions` to the trigger returned by `trigger` on `handle`.
    fn build_automation(
        &mut self,
        handle: &Handle,
        trigger: &str,
        args: &[TriggerArg],
        actions: &[Action],
    ) -> Result<(), EmitError>;
}

impl<E: Emitter + ?Sized> Emitter for &mut E {
    fn construct(
        &mut self,
        id: &Ident,
        schema: &ComponentSchema,
        args: &[Arg],
    ) -> Result<Handle, EmitError> {
        (**self).construct(id, schema, args)
    }

    fn register_lifecycle(&mut self, handle: &Handle) -> Result<(), EmitError> {
        (**self).register_lifecycle(handle)
    }

    fn call_setter(
        &mut self,
        handle: &Handle,
        setter: &str,
        value: &Arg,
    ) -> Result<(), EmitError> {
        (**self).call_setter(handle, setter, value)
    }

    fn build_automation(
        &mut self,
        handle: &Handle,
        trigger: &str,
        args: &[TriggerArg],
        actions: &[Action],
    ) -> Result<(), EmitError> {
        (**self).build_automation(handle, trigger, args, actions)
    }
}
