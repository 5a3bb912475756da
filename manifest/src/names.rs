use std::{borrow::Borrow, fmt, str::FromStr, sync::Arc};

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::Error;

/// Identifiers end up as C++ variable names, so they follow C identifier rules.
pub(crate) fn ensure_identifier(name: &str, kind: &'static str) -> Result<(), Error> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid(kind, name, "must not be empty"));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid(kind, name, "must start with a letter or `_`"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(kind, name, "only letters, digits and `_` are allowed"));
    }
    Ok(())
}

/// Domains and option keys are lowercase snake case.
pub(crate) fn ensure_snake_case(name: &str, kind: &'static str) -> Result<(), Error> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid(kind, name, "must not be empty"));
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid(kind, name, "must start with a lowercase letter"));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(invalid(kind, name, "must be lowercase snake case"));
    }
    Ok(())
}

fn invalid(kind: &'static str, name: &str, reason: &'static str) -> Error {
    Error::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    }
}

macro_rules! name_type {
    ($name:ident, $kind:expr, $check:path) => {
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            DeserializeFromStr,
            SerializeDisplay,
        )]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(name: impl Into<String>) -> Result<Self, Error> {
                let name = name.into();
                $check(&name, $kind)?;
                Ok(Self(Arc::from(name)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                $check(value, $kind)?;
                Ok(Self(Arc::from(value)))
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                Self::try_from(input)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type!(Ident, "identifier", ensure_identifier);
name_type!(Domain, "domain", ensure_snake_case);
name_type!(OptionName, "option", ensure_snake_case);
