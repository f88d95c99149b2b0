use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol(math_symbols::Symbol);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(math_symbols::Symbol::new(name))
    }

    pub fn name(&self) -> String {
        self.0.name()
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        Ok(Self::new(&name))
    }
}

#[macro_export]
macro_rules! symbols {
    ( $( $x:ident ),* ) => {
        $(
            let $x = $crate::symbol::Symbol::new(stringify!($x));
        )*
    };
}

/// Source of fresh symbols
///
/// Every calculation threads one `Naming` through graph construction
/// and expression assembly, so generated names never clash within a
/// calculation while separate calculations stay independent.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Naming {
    momentum_prefix: String,
    next_momentum: usize,
}

impl Default for Naming {
    fn default() -> Self {
        Self::new("p")
    }
}

impl Naming {
    pub fn new(momentum_prefix: &str) -> Self {
        Self {
            momentum_prefix: momentum_prefix.to_owned(),
            next_momentum: 1,
        }
    }

    /// A momentum symbol that has not been handed out before
    pub fn fresh_momentum(&mut self) -> Symbol {
        let name = format!("{}{}", self.momentum_prefix, self.next_momentum);
        self.next_momentum += 1;
        Symbol::new(&name)
    }

    pub fn momenta_issued(&self) -> usize {
        self.next_momentum - 1
    }
}
