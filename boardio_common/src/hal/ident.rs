//! Pin, port and bus identifiers and their normalization.
//!
//! Callers address hardware either by zero-based index or by a
//! board-defined symbolic name. `NameTable` maps both forms to the
//! canonical index; every driver operation taking an identifier goes
//! through it first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::hal::driver::IoError;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(untagged)]
        pub enum $name {
            /// Zero-based numeric index.
            Index(usize),
            /// Board-defined symbolic name.
            Name(String),
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self::Index(index)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::Name(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::Name(name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Index(i) => write!(f, "{i}"),
                    Self::Name(n) => write!(f, "{n:?}"),
                }
            }
        }
    };
}

identifier! {
    /// Pin reference accepted across the driver boundary.
    PinId
}

identifier! {
    /// Serial port reference.
    PortId
}

identifier! {
    /// I2C bus reference.
    BusId
}

/// Which identifier namespace a `NameTable` normalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    /// Pin table.
    Pin,
    /// Serial ports.
    Port,
    /// I2C buses.
    Bus,
}

impl IdentKind {
    fn unknown(self, ident: String) -> IoError {
        match self {
            Self::Pin => IoError::UnknownPin(ident),
            Self::Port => IoError::UnknownPort(ident),
            Self::Bus => IoError::UnknownPort(format!("i2c bus {ident}")),
        }
    }
}

/// Normalization table for one identifier namespace.
///
/// Resolution order for names: exact alias match, then a decimal string
/// naming an in-range index. Anything else is unknown.
#[derive(Debug, Clone)]
pub struct NameTable {
    kind: IdentKind,
    len: usize,
    aliases: HashMap<String, usize>,
}

impl NameTable {
    /// Create a table for `len` entries with no aliases.
    pub fn new(kind: IdentKind, len: usize) -> Self {
        Self {
            kind,
            len,
            aliases: HashMap::new(),
        }
    }

    /// Number of addressable entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table addresses nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `name` as an alias of `index`.
    ///
    /// # Errors
    /// `IoError::Config` for an empty name, an out-of-range index or a
    /// name already bound to another entry.
    pub fn alias(&mut self, name: &str, index: usize) -> Result<(), IoError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IoError::Config("alias cannot be empty".to_string()));
        }
        if index >= self.len {
            return Err(IoError::Config(format!(
                "alias {name:?} targets index {index} (only {} entries)",
                self.len
            )));
        }
        if name.parse::<usize>().is_ok_and(|n| n != index) {
            return Err(IoError::Config(format!(
                "numeric alias {name:?} would shadow index {name}"
            )));
        }
        match self.aliases.get(name) {
            Some(&existing) if existing != index => Err(IoError::Config(format!(
                "alias {name:?} bound to both {existing} and {index}"
            ))),
            _ => {
                self.aliases.insert(name.to_string(), index);
                Ok(())
            }
        }
    }

    /// Aliases bound to `index`, sorted.
    pub fn aliases_of(&self, index: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, i)| **i == index)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Resolve an index-or-name to the canonical index.
    pub fn resolve_index(&self, index: usize) -> Result<usize, IoError> {
        if index < self.len {
            Ok(index)
        } else {
            Err(self.kind.unknown(index.to_string()))
        }
    }

    /// Resolve a symbolic name to the canonical index.
    pub fn resolve_name(&self, name: &str) -> Result<usize, IoError> {
        let trimmed = name.trim();
        if let Some(&index) = self.aliases.get(trimmed) {
            return Ok(index);
        }
        match trimmed.parse::<usize>() {
            Ok(index) if index < self.len => Ok(index),
            _ => Err(self.kind.unknown(format!("{name:?}"))),
        }
    }

    /// Normalize a pin identifier.
    pub fn pin(&self, pin: &PinId) -> Result<usize, IoError> {
        match pin {
            PinId::Index(i) => self.resolve_index(*i),
            PinId::Name(n) => self.resolve_name(n),
        }
    }

    /// Normalize a serial port identifier.
    pub fn port(&self, port: &PortId) -> Result<usize, IoError> {
        match port {
            PortId::Index(i) => self.resolve_index(*i),
            PortId::Name(n) => self.resolve_name(n),
        }
    }

    /// Normalize an I2C bus identifier.
    pub fn bus(&self, bus: &BusId) -> Result<usize, IoError> {
        match bus {
            BusId::Index(i) => self.resolve_index(*i),
            BusId::Name(n) => self.resolve_name(n),
        }
    }
}
