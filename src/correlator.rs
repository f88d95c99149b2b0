use std::io::Read;

use nom::{
    character::complete::{alpha1, alphanumeric0, char, digit1, multispace0},
    combinator::{map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::{QuantumField, Statistics};
use crate::symbol::Symbol;
use crate::vertex::VertexIds;
use crate::wick::{Options, WickCalculator};

/// Particle content of a model
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Particle {
    pub name: String,
    #[serde(default)]
    pub fermion: bool,
    #[serde(default)]
    pub self_conjugate: bool,
}

/// A correlator together with everything needed to contract it
///
/// ```yaml
/// particles: [{name: phi, self_conjugate: true}]
/// external: [x1, x2]
/// vertex_ids: {y1: 1, y2: 1}
/// correlator: "phi(x1) phi(x2) phi(y1)^3 phi(y2)^3"
/// options: {exclude_tadpoles: true}
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Process {
    #[serde(default)]
    pub name: Option<String>,
    pub particles: Vec<Particle>,
    /// Points of external fields
    #[serde(default)]
    pub external: Vec<Symbol>,
    /// External points with incoming particles. If empty, all are incoming.
    #[serde(default)]
    pub incoming: Vec<Symbol>,
    #[serde(default)]
    pub vertex_ids: VertexIds,
    pub correlator: String,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to parse correlator at `{0}`")]
    ParseError(String),
    #[error("Unknown particle `{0}`")]
    UnknownParticle(String),
    #[error("External point `{0}` does not appear in the correlator")]
    UnusedExternal(Symbol),
    #[error("Failed to read process: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl<'a> From<nom::Err<nom::error::Error<&'a str>>> for ImportError {
    fn from(e: nom::Err<nom::error::Error<&'a str>>) -> Self {
        ImportError::ParseError(e.to_string())
    }
}

impl Process {
    /// The fields of the correlator in their original order
    pub fn fields(&self) -> Result<Vec<QuantumField>, ImportError> {
        let (rest, tokens) = correlator(&self.correlator)?;
        if !rest.trim().is_empty() {
            return Err(ImportError::ParseError(rest.to_owned()));
        }
        let mut fields = Vec::new();
        for token in tokens {
            let Some(particle) = self.particles.iter().find(|p| p.name == token.name)
            else {
                return Err(ImportError::UnknownParticle(token.name.to_owned()));
            };
            let point = Symbol::new(token.point);
            let external = self.external.contains(&point);
            let field = QuantumField {
                name: Symbol::new(token.name),
                point,
                statistics: if particle.fermion {
                    Statistics::Fermion
                } else {
                    Statistics::Boson
                },
                self_conjugate: particle.self_conjugate,
                conjugate: token.conjugate,
                external,
                incoming: !external
                    || self.incoming.is_empty()
                    || self.incoming.contains(&point),
                index: token.index.map(Symbol::new),
            };
            fields.extend(std::iter::repeat(field).take(token.power as usize));
        }
        if let Some(unused) = self
            .external
            .iter()
            .find(|&&x| !fields.iter().any(|f| f.point == x))
        {
            return Err(ImportError::UnusedExternal(*unused));
        }
        Ok(fields)
    }

    pub fn calculator(&self) -> WickCalculator {
        WickCalculator::new(self.options.clone())
            .with_vertex_ids(self.vertex_ids.clone())
    }
}

/// Read all processes from a stream of YAML documents
pub fn read_processes(reader: impl Read) -> Result<Vec<Process>, ImportError> {
    serde_yaml::Deserializer::from_reader(reader)
        .map(|doc| Process::deserialize(doc).map_err(ImportError::from))
        .collect()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct FieldToken<'a> {
    name: &'a str,
    conjugate: bool,
    point: &'a str,
    index: Option<&'a str>,
    power: u32,
}

// fields are separated by whitespace or `*`
fn correlator(input: &str) -> IResult<&str, Vec<FieldToken<'_>>> {
    many0(preceded(
        tuple((multispace0, opt(char('*')), multispace0)),
        field,
    ))(input)
}

// name[~](point[, index])[^power]
fn field(input: &str) -> IResult<&str, FieldToken<'_>> {
    let (rest, (name, conjugate, (point, index), power)) = tuple((
        var,
        opt(char('~')),
        delimited(
            pair(char('('), multispace0),
            pair(
                var,
                opt(preceded(
                    tuple((multispace0, char(','), multispace0)),
                    var,
                )),
            ),
            pair(multispace0, char(')')),
        ),
        opt(preceded(pair(multispace0, char('^')), preceded(multispace0, u32))),
    ))(input)?;
    let token = FieldToken {
        name,
        conjugate: conjugate.is_some(),
        point,
        index,
        power: power.unwrap_or(1),
    };
    Ok((rest, token))
}

fn var(input: &str) -> IResult<&str, &str> {
    recognize(tuple((alpha1, alphanumeric0)))(input)
}

fn u32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(input)
}
