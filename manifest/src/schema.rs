use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::value::{Literal, LiteralKind, OptionValue};

/// A typed argument passed to automation actions when a trigger fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TriggerArg {
    /// C++ type of the argument.
    pub ty: &'static str,
    pub name: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionKind {
    Literal { literal: LiteralKind },
    /// Reference to a component whose class is, or derives from, `class`.
    Reference { class: &'static str },
    Automation { args: &'static [TriggerArg] },
}

impl OptionKind {
    pub fn accepts(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (OptionKind::Literal { literal }, OptionValue::Literal(v)) => {
                v.kind() == *literal
                    || (*literal == LiteralKind::Float && matches!(v, Literal::Int(_)))
            }
            (OptionKind::Reference { .. }, OptionValue::Reference(_)) => true,
            (OptionKind::Automation { .. }, OptionValue::Automation(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Literal {
                literal: LiteralKind::Int,
            } => f.write_str("an int literal"),
            OptionKind::Literal { literal } => write!(f, "a {literal} literal"),
            OptionKind::Reference { class } => write!(f, "a reference to a {class}"),
            OptionKind::Automation { .. } => f.write_str("an automation"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
}

/// When, and through which member, an option reaches the native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "member", rename_all = "snake_case")]
pub enum Stage {
    /// Passed positionally to the constructor, in schema order.
    Constructor,
    /// Applied through the named setter after registration.
    Setter(&'static str),
    /// An automation attached to the trigger returned by the named getter.
    Trigger(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OptionSchema {
    pub name: &'static str,
    pub kind: OptionKind,
    pub presence: Presence,
    pub stage: Stage,
}

impl OptionSchema {
    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ComponentSchema {
    pub domain: &'static str,
    pub namespace: &'static str,
    pub class: &'static str,
    /// Fully qualified base classes, used when checking reference targets.
    pub bases: &'static [&'static str],
    pub header: &'static str,
    /// Other domains that must be configured alongside this one.
    pub dependencies: &'static [&'static str],
    pub codeowners: &'static [&'static str],
    /// Platform-based domains require a `platform` key naming one of these.
    pub platforms: &'static [&'static str],
    /// Whether the domain accepts a list of instances.
    pub multi: bool,
    pub options: &'static [OptionSchema],
}

/// Options every component inherits from the shared component schema.
pub const COMPONENT_OPTIONS: &[OptionSchema] = &[OptionSchema {
    name: "setup_priority",
    kind: OptionKind::Literal {
        literal: LiteralKind::Float,
    },
    presence: Presence::Optional,
    stage: Stage::Setter("set_setup_priority"),
}];

impl ComponentSchema {
    pub fn qualified_class(&self) -> String {
        format!("{}::{}", self.namespace, self.class)
    }

    pub fn is_a(&self, class: &str) -> bool {
        self.qualified_class() == class || self.bases.contains(&class)
    }

    pub fn options(&self) -> impl Iterator<Item = &'static OptionSchema> + use<> {
        let own: &'static [OptionSchema] = self.options;
        own.iter().chain(COMPONENT_OPTIONS.iter())
    }

    pub fn option(&self, name: &str) -> Option<&'static OptionSchema> {
        self.options().find(|o| o.name == name)
    }

    /// Constructor options in positional order.
    pub fn constructor_options(&self) -> impl Iterator<Item = &'static OptionSchema> + use<> {
        self.options().filter(|o| o.stage == Stage::Constructor)
    }

    pub(crate) fn option_names(&self) -> String {
        let names: Vec<&str> = self.options().map(|o| o.name).collect();
        names.join(", ")
    }
}

const UART: ComponentSchema = ComponentSchema {
    domain: "uart",
    namespace: "uart",
    class: "UARTComponent",
    bases: &["Component"],
    header: "esphome/components/uart/uart.h",
    dependencies: &[],
    codeowners: &[],
    platforms: &[],
    multi: true,
    options: &[
        OptionSchema {
            name: "tx_pin",
            kind: OptionKind::Literal {
                literal: LiteralKind::Int,
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_tx_pin"),
        },
        OptionSchema {
            name: "rx_pin",
            kind: OptionKind::Literal {
                literal: LiteralKind::Int,
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_rx_pin"),
        },
        OptionSchema {
            name: "baud_rate",
            kind: OptionKind::Literal {
                literal: LiteralKind::Int,
            },
            presence: Presence::Required,
            stage: Stage::Setter("set_baud_rate"),
        },
    ],
};

const TIME: ComponentSchema = ComponentSchema {
    domain: "time",
    namespace: "sntp",
    class: "SNTPComponent",
    bases: &["time::RealTimeClock", "Component"],
    header: "esphome/components/sntp/sntp_component.h",
    dependencies: &[],
    codeowners: &[],
    platforms: &["sntp"],
    multi: true,
    options: &[OptionSchema {
        name: "timezone",
        kind: OptionKind::Literal {
            literal: LiteralKind::String,
        },
        presence: Presence::Optional,
        stage: Stage::Setter("set_timezone"),
    }],
};

const DFPLAYER_PRO: ComponentSchema = ComponentSchema {
    domain: "dfplayer_pro",
    namespace: "dfplayer_pro",
    class: "DFPlayerPro",
    bases: &["Component", "uart::UARTDevice"],
    header: "esphome/components/dfplayer_pro/dfplayer_pro.h",
    dependencies: &["uart"],
    codeowners: &["@10der"],
    platforms: &[],
    multi: false,
    options: &[OptionSchema {
        name: "uart_id",
        kind: OptionKind::Reference {
            class: "uart::UARTComponent",
        },
        presence: Presence::Required,
        stage: Stage::Constructor,
    }],
};

const DISPLAY_TOOLS: ComponentSchema = ComponentSchema {
    domain: "display_tools",
    namespace: "display_tools",
    class: "DisplayTools",
    bases: &["Component"],
    header: "esphome/components/display_tools/display_tools.h",
    dependencies: &[],
    codeowners: &["@10der"],
    platforms: &[],
    multi: false,
    options: &[
        OptionSchema {
            name: "clock_time",
            kind: OptionKind::Reference {
                class: "time::RealTimeClock",
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_clock_time"),
        },
        OptionSchema {
            name: "on_play_sound",
            kind: OptionKind::Automation {
                args: &[TriggerArg {
                    ty: "int",
                    name: "x",
                }],
            },
            presence: Presence::Optional,
            stage: Stage::Trigger("get_on_play_trigger"),
        },
    ],
};

static BUILTIN: [ComponentSchema; 4] = [UART, TIME, DFPLAYER_PRO, DISPLAY_TOOLS];

/// Fixed table of component schemas keyed by domain.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    schemas: BTreeMap<&'static str, &'static ComponentSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        BUILTIN.iter().fold(Self::new(), Catalog::with)
    }

    pub fn with(mut self, schema: &'static ComponentSchema) -> Self {
        self.schemas.insert(schema.domain, schema);
        self
    }

    pub fn get(&self, domain: &str) -> Option<&'static ComponentSchema> {
        self.schemas.get(domain).copied()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &'static ComponentSchema> + '_ {
        self.schemas.values().copied()
    }

    pub(crate) fn domain_names(&self) -> String {
        let names: Vec<&str> = self.schemas.keys().copied().collect();
        names.join(", ")
    }
}
