use std::io::{Error, Write};

use clap::ValueEnum;
use serde::Serialize;

use feynwick::diagram::{Diagram, DiagramVertex, Propagator};
use feynwick::expr::Expr;
use feynwick::graph_util::Format;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum,
)]
pub(crate) enum OutFormat {
    Text,
    Yaml,
}

#[derive(Serialize)]
struct ProcessRecord<'a> {
    name: &'a str,
    diagrams: Vec<DiagramRecord<'a>>,
}

#[derive(Serialize)]
struct DiagramRecord<'a> {
    vertices: Vec<&'a DiagramVertex>,
    propagators: Vec<(usize, usize, &'a Propagator)>,
    factor: i64,
    symmetry_factor: String,
    loops: usize,
    topology: String,
    expression: String,
}

impl<'a> DiagramRecord<'a> {
    fn new(expr: &Expr, dia: &'a Diagram) -> Self {
        Self {
            vertices: dia.vertices().collect(),
            propagators: dia.propagators().collect(),
            factor: dia.factor(),
            symmetry_factor: dia.symmetry_factor().to_string(),
            loops: dia.loops(),
            topology: dia.topology().to_string(),
            expression: expr.to_string(),
        }
    }
}

pub(crate) fn write(
    mut out: impl Write,
    name: &str,
    diagrams: &[(Expr, Diagram)],
    format: OutFormat,
) -> Result<(), Error> {
    use OutFormat::*;
    match format {
        Text => {
            writeln!(out, "{name}: {} diagrams", diagrams.len())?;
            for (n, (expr, dia)) in diagrams.iter().enumerate() {
                writeln!(out, "{n}: {}", dia.format())?;
                writeln!(out, "   = {expr}")?;
            }
            Ok(())
        }
        Yaml => {
            let record = ProcessRecord {
                name,
                diagrams: diagrams
                    .iter()
                    .map(|(expr, dia)| DiagramRecord::new(expr, dia))
                    .collect(),
            };
            writeln!(out, "---")?;
            serde_yaml::to_writer(&mut out, &record).map_err(Error::other)
        }
    }
}
