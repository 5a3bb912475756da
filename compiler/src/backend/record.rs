use std::collections::HashSet;

use wiring_manifest::{Action, ComponentSchema, Ident, TriggerArg};
use wiring_scenario::Handle;

use crate::emit::{Arg, EmitError, Emitter};

/// One emitter call, as the resolver made it.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Construct {
        id: Ident,
        class: String,
        args: Vec<Arg>,
    },
    RegisterLifecycle {
        id: Ident,
    },
    CallSetter {
        id: Ident,
        setter: String,
        value: Arg,
    },
    BuildAutomation {
        id: Ident,
        trigger: String,
        actions: Vec<Action>,
    },
}

impl Call {
    pub fn id(&self) -> &Ident {
        match self {
            Call::Construct { id, .. }
            | Call::RegisterLifecycle { id }
            | Call::CallSetter { id, .. }
            | Call::BuildAutomation { id, .. } => id,
        }
    }
}

/// An emitter that produces no code and only remembers what it was asked to do.
#[derive(Clone, Debug, Default)]
pub struct RecordingEmitter {
    calls: Vec<Call>,
    constructed: HashSet<Ident>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<Call> {
        self.calls
    }

    fn known(&self, handle: &Handle) -> Result<(), EmitError> {
        if self.constructed.contains(handle.id()) {
            Ok(())
        } else {
            Err(EmitError::UnknownHandle {
                id: handle.id().clone(),
            })
        }
    }
}

impl Emitter for RecordingEmitter {
    fn construct(
        &mut self,
        id: &Ident,
        schema: &ComponentSchema,
        args: &[Arg],
    ) -> Result<Handle, EmitError> {
        if !self.constructed.insert(id.clone()) {
            return Err(EmitError::AlreadyConstructed { id: id.clone() });
        }
        let class = schema.qualified_class();
        self.calls.push(Call::Construct {
            id: id.clone(),
            class: class.clone(),
            args: args.to_vec(),
        });
        Ok(Handle::new(id.clone(), class))
    }

    fn register_lifecycle(&mut self, handle: &Handle) -> Result<(), EmitError> {
        self.known(handle)?;
        self.calls.push(Call::RegisterLifecycle {
            id: handle.id().clone(),
        });
        Ok(())
    }

    fn call_setter(
        &mut self,
        handle: &Handle,
        setter: &str,
        value: &Arg,
    ) -> Result<(), EmitError> {
        self.known(handle)?;
        self.calls.push(Call::CallSetter {
            id: handle.id().clone(),
            setter: setter.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn build_automation(
        &mut self,
        handle: &Handle,
        trigger: &str,
        _args: &[TriggerArg],
        actions: &[Action],
    ) -> Result<(), EmitError> {
        self.known(handle)?;
        self.calls.push(Call::BuildAutomation {
            id: handle.id().clone(),
            trigger: trigger.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }
}
