pub mod component;
pub mod correlator;
pub mod diagram;
pub mod expr;
pub mod fermion;
pub mod field;
pub mod graph;
pub mod graph_util;
pub mod sign;
pub mod symbol;
pub mod topology;
pub mod vertex;
pub mod wick;

mod canon;

pub use correlator::{ImportError, Particle, Process};
pub use diagram::Diagram;
pub use expr::Expr;
pub use field::{Field, FieldKind, QuantumField};
pub use symbol::{Naming, Symbol};
pub use wick::{Options, WickCalculator, WickError};
