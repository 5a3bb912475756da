use std::fmt;

use serde::Serialize;

use crate::names::Ident;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Bool,
    Int,
    Float,
    String,
}

impl LiteralKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LiteralKind::Bool => "bool",
            LiteralKind::Int => "int",
            LiteralKind::Float => "float",
            LiteralKind::String => "string",
        }
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Bool(_) => LiteralKind::Bool,
            Literal::Int(_) => LiteralKind::Int,
            Literal::Float(_) => LiteralKind::Float,
            Literal::String(_) => LiteralKind::String,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// One step of an automation, run when the owning trigger fires.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Inline C++ body with the trigger arguments in scope.
    Lambda(String),
    Delay { millis: u32 },
    LoggerLog(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Lambda(_) => "lambda",
            Action::Delay { .. } => "delay",
            Action::LoggerLog(_) => "logger.log",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Automation {
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Literal(Literal),
    /// Identifier of another declared component, resolved at wiring time.
    Reference(Ident),
    Automation(Automation),
}

impl OptionValue {
    pub fn as_reference(&self) -> Option<&Ident> {
        match self {
            OptionValue::Reference(id) => Some(id),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            OptionValue::Literal(Literal::Bool(_)) => "a bool literal",
            OptionValue::Literal(Literal::Int(_)) => "an int literal",
            OptionValue::Literal(Literal::Float(_)) => "a float literal",
            OptionValue::Literal(Literal::String(_)) => "a string literal",
            OptionValue::Reference(_) => "a component reference",
            OptionValue::Automation(_) => "an automation",
        }
    }
}

impl From<Literal> for OptionValue {
    fn from(value: Literal) -> Self {
        OptionValue::Literal(value)
    }
}

impl From<Ident> for OptionValue {
    fn from(value: Ident) -> Self {
        OptionValue::Reference(value)
    }
}
