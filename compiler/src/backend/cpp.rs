use std::{collections::HashSet, fmt::Write as _};

use wiring_manifest::{Action, ComponentSchema, Ident, TriggerArg};
use wiring_scenario::Handle;

use crate::emit::{Arg, EmitError, Emitter};

const INDENT: &str = "  ";

/// Emits an ESPHome-style `main.cpp`: one global pointer per component, constructed and
/// wired inside `setup()`.
#[derive(Clone, Debug, Default)]
pub struct CppEmitter {
    includes: Vec<&'static str>,
    globals: Vec<String>,
    setup: Vec<String>,
    names: HashSet<String>,
    constructed: HashSet<Ident>,
}

impl CppEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generated translation unit.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Auto generated code by wiring");
        let _ = writeln!(out, "#include \"esphome.h\"");
        for header in &self.includes {
            let _ = writeln!(out, "#include \"{header}\"");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "using namespace esphome;");
        for global in &self.globals {
            let _ = writeln!(out, "{global}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "void setup() {{");
        for line in &self.setup {
            if line.is_empty() {
                let _ = writeln!(out);
            } else {
                let _ = writeln!(out, "{INDENT}{line}");
            }
        }
        let _ = writeln!(out, "{INDENT}App.setup();");
        let _ = writeln!(out, "}}");
        let _ = writeln!(out);
        let _ = writeln!(out, "void loop() {{");
        let _ = writeln!(out, "{INDENT}App.loop();");
        let _ = writeln!(out, "}}");
        out
    }

    pub fn into_source(self) -> String {
        self.render()
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

    /// A fresh variable name: `base`, then `base_2`, `base_3`, ...
    fn fresh(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 2;
        while self.names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.names.insert(name.clone());
        name
    }

    fn declare(&mut self, ty: &str, name: &str) {
        self.globals.push(format!("{ty} *{name};"));
    }
}

fn render_arg(arg: &Arg) -> String {
    match arg {
        Arg::Literal(literal) => literal.to_string(),
        Arg::Handle(handle) => handle.id().to_string(),
    }
}

fn template_args(args: &[TriggerArg]) -> String {
    let types: Vec<&str> = args.iter().map(|a| a.ty).collect();
    types.join(", ")
}

fn lambda_params(args: &[TriggerArg]) -> String {
    let params: Vec<String> = args.iter().map(|a| format!("{} {}", a.ty, a.name)).collect();
    params.join(", ")
}

fn c_string(message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 2);
    out.push('"');
    for ch in message.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

impl Emitter for CppEmitter {
    fn construct(
        &mut self,
        id: &Ident,
        schema: &ComponentSchema,
        args: &[Arg],
    ) -> Result<Handle, EmitError> {
        if self.constructed.contains(id) {
            return Err(EmitError::AlreadyConstructed { id: id.clone() });
        }
        if !self.names.insert(id.to_string()) {
            return Err(EmitError::NameClash { id: id.clone() });
        }
        self.constructed.insert(id.clone());

        if !self.includes.contains(&schema.header) {
            self.includes.push(schema.header);
        }
        let class = schema.qualified_class();
        self.declare(&class, id.as_str());

        let args: Vec<String> = args.iter().map(render_arg).collect();
        if !self.setup.is_empty() {
            self.setup.push(String::new());
        }
        self.setup
            .push(format!("{id} = new {class}({});", args.join(", ")));
        Ok(Handle::new(id.clone(), class))
    }

    fn register_lifecycle(&mut self, handle: &Handle) -> Result<(), EmitError> {
        self.known(handle)?;
        self.setup
            .push(format!("App.register_component({});", handle.id()));
        Ok(())
    }

    fn call_setter(
        &mut self,
        handle: &Handle,
        setter: &str,
        value: &Arg,
    ) -> Result<(), EmitError> {
        self.known(handle)?;
        self.setup
            .push(format!("{}->{setter}({});", handle.id(), render_arg(value)));
        Ok(())
    }

    fn build_automation(
        &mut self,
        handle: &Handle,
        trigger: &str,
        args: &[TriggerArg],
        actions: &[Action],
    ) -> Result<(), EmitError> {
        self.known(handle)?;
        let targs = template_args(args);
        let params = lambda_params(args);

        let automation = self.fresh("automation_id");
        self.declare(&format!("Automation<{targs}>"), &automation);
        self.setup.push(format!(
            "{automation} = new Automation<{targs}>({}->{trigger}());",
            handle.id()
        ));

        let mut action_names = Vec::with_capacity(actions.len());
        for action in actions {
            let name = match action {
                Action::Lambda(code) => {
                    let name = self.fresh("lambdaaction_id");
                    self.declare(&format!("LambdaAction<{targs}>"), &name);
                    self.setup.push(format!(
                        "{name} = new LambdaAction<{targs}>([=]({params}) -> void {{"
                    ));
                    for line in code.lines() {
                        self.setup.push(format!("{INDENT}{line}"));
                    }
                    self.setup.push("});".to_string());
                    name
                }
                Action::LoggerLog(message) => {
                    let name = self.fresh("lambdaaction_id");
                    self.declare(&format!("LambdaAction<{targs}>"), &name);
                    self.setup.push(format!(
                        "{name} = new LambdaAction<{targs}>([=]({params}) -> void {{"
                    ));
                    self.setup.push(format!(
                        "{INDENT}ESP_LOGD(\"main\", {});",
                        c_string(message)
                    ));
                    self.setup.push("});".to_string());
                    name
                }
                Action::Delay { millis } => {
                    let name = self.fresh("delayaction_id");
                    self.declare(&format!("DelayAction<{targs}>"), &name);
                    self.setup
                        .push(format!("{name} = new DelayAction<{targs}>();"));
                    self.setup
                        .push(format!("App.register_component({name});"));
                    self.setup.push(format!("{name}->set_delay({millis});"));
                    name
                }
            };
            action_names.push(name);
        }

        self.setup.push(format!(
            "{automation}->add_actions({{{}}});",
            action_names.join(", ")
        ));
        Ok(())
    }
}
