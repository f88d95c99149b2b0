use std::fmt::{self, Display};

use petgraph::graph::{IndexType, UnGraph};
use serde::{Deserialize, Serialize};

use crate::graph_util::min_cycle_length;

/// Diagram class according to the length of its shortest loop
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
pub enum TopologyClass {
    #[default]
    Tree,
    Tadpole,
    MassCorrection,
    Triangle,
    Box,
    Pentagon,
    Higher(usize),
}

impl TopologyClass {
    pub fn from_cycle_length(len: Option<usize>) -> Self {
        use TopologyClass::*;
        match len {
            None => Tree,
            Some(1) => Tadpole,
            Some(2) => MassCorrection,
            Some(3) => Triangle,
            Some(4) => Box,
            Some(5) => Pentagon,
            Some(n) => Higher(n),
        }
    }

    pub fn of<N, E, Ix: IndexType>(g: &UnGraph<N, E, Ix>) -> Self {
        Self::from_cycle_length(min_cycle_length(g))
    }
}

impl Display for TopologyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TopologyClass::*;
        match self {
            Tree => write!(f, "tree"),
            Tadpole => write!(f, "tadpole"),
            MassCorrection => write!(f, "mass correction"),
            Triangle => write!(f, "triangle"),
            Box => write!(f, "box"),
            Pentagon => write!(f, "pentagon"),
            Higher(n) => write!(f, "{n}-point loop"),
        }
    }
}
