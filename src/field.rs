use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::symbol::Symbol;

/// Particle name together with its conjugation state
///
/// Two field occurrences of the same kind at one vertex are
/// interchangeable as far as contractions are concerned.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
)]
pub struct FieldKind {
    pub name: Symbol,
    pub conjugate: bool,
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conjugate {
            write!(f, "{}~", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Statistics {
    #[default]
    Boson,
    Fermion,
}

/// A field operator inserted at a space-time point
///
/// This is everything the contraction engine needs to know about a
/// field. Coupling constants, group indices and the like are opaque to
/// the engine and only enter through `propagator`.
pub trait Field: Clone + Debug {
    /// Particle name, shared by a field and its conjugate
    fn name(&self) -> Symbol;

    /// Space-time point the field is inserted at
    fn point(&self) -> Symbol;

    fn is_external(&self) -> bool;

    fn is_fermionic(&self) -> bool;

    fn is_bosonic(&self) -> bool {
        !self.is_fermionic()
    }

    fn is_self_conjugate(&self) -> bool;

    fn is_complex_conjugate(&self) -> bool;

    /// Role of an external field when diagrams are compared without
    /// regard to external identities
    fn is_incoming(&self) -> bool {
        true
    }

    /// Whether the pair `<self other>` is a non-vanishing propagator
    fn is_exactly_contractible_with(&self, other: &Self) -> bool;

    /// Weaker form of `is_exactly_contractible_with`
    ///
    /// If this is false the contraction vanishes. Used to detect
    /// vanishing correlators before starting the search.
    fn is_contractible_with(&self, other: &Self) -> bool {
        self.name() == other.name()
    }

    /// Propagator for the contraction `<self other>` carrying momentum `p`
    fn propagator(&self, other: &Self, p: Symbol) -> Expr;

    /// Label distinguishing otherwise identical fields
    fn index(&self) -> Option<Symbol> {
        None
    }

    /// Whether exchanging the two fields leaves every contraction
    /// unchanged
    ///
    /// Only such fields at one vertex are counted as a multiplicity
    /// instead of being contracted separately.
    fn is_interchangeable_with(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.index() == other.index()
    }

    fn kind(&self) -> FieldKind {
        FieldKind {
            name: self.name(),
            conjugate: self.is_complex_conjugate() && !self.is_self_conjugate(),
        }
    }
}

/// A field operator with fixed properties
#[derive(
    Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
pub struct QuantumField {
    pub name: Symbol,
    pub point: Symbol,
    pub statistics: Statistics,
    pub self_conjugate: bool,
    pub conjugate: bool,
    pub external: bool,
    pub incoming: bool,
    /// Label distinguishing otherwise identical fields, e.g. a spinor index
    #[serde(default)]
    pub index: Option<Symbol>,
}

impl QuantumField {
    /// A real scalar field, its own antiparticle
    pub fn real_scalar(name: Symbol, point: Symbol) -> Self {
        Self {
            name,
            point,
            statistics: Statistics::Boson,
            self_conjugate: true,
            conjugate: false,
            external: false,
            incoming: true,
            index: None,
        }
    }

    /// A Dirac fermion, or its conjugate if `conjugate` is set
    pub fn dirac(name: Symbol, point: Symbol, conjugate: bool) -> Self {
        Self {
            name,
            point,
            statistics: Statistics::Fermion,
            self_conjugate: false,
            conjugate,
            external: false,
            incoming: true,
            index: None,
        }
    }

    /// A Majorana fermion
    pub fn majorana(name: Symbol, point: Symbol) -> Self {
        Self {
            name,
            point,
            statistics: Statistics::Fermion,
            self_conjugate: true,
            conjugate: false,
            external: false,
            incoming: true,
            index: None,
        }
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn outgoing(mut self) -> Self {
        self.incoming = false;
        self
    }

    pub fn with_index(mut self, index: Symbol) -> Self {
        self.index = Some(index);
        self
    }

    pub fn conjugated(mut self) -> Self {
        self.conjugate = !self.conjugate;
        self
    }
}

impl Display for QuantumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.index {
            write!(f, "{}({}, {index})", self.kind(), self.point)
        } else {
            write!(f, "{}({})", self.kind(), self.point)
        }
    }
}

impl Field for QuantumField {
    fn name(&self) -> Symbol {
        self.name
    }

    fn point(&self) -> Symbol {
        self.point
    }

    fn is_external(&self) -> bool {
        self.external
    }

    fn is_fermionic(&self) -> bool {
        self.statistics == Statistics::Fermion
    }

    fn is_self_conjugate(&self) -> bool {
        self.self_conjugate
    }

    fn is_complex_conjugate(&self) -> bool {
        self.conjugate
    }

    fn is_incoming(&self) -> bool {
        self.incoming
    }

    fn index(&self) -> Option<Symbol> {
        self.index
    }

    fn is_exactly_contractible_with(&self, other: &Self) -> bool {
        self.name == other.name
            && self.statistics == other.statistics
            && (self.self_conjugate || self.conjugate != other.conjugate)
    }

    fn propagator(&self, other: &Self, p: Symbol) -> Expr {
        let end = |f: &Self| match f.index {
            Some(index) => Expr::function(f.point, vec![Expr::symbol(index)]),
            None => Expr::symbol(f.point),
        };
        Expr::function(
            Symbol::new("prop"),
            vec![Expr::symbol(self.name), end(self), end(other), Expr::symbol(p)],
        )
    }
}
