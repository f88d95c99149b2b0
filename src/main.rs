mod opt;
mod version;
mod writer;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use feynwick::correlator::read_processes;
use feynwick::symbol::{Naming, Symbol};

use crate::opt::Args;
use crate::version::{NAME, VERSION_STRING};
use crate::writer::write;

fn write_diagrams(args: Args, mut out: impl Write) -> Result<()> {
    let heavy = Vec::from_iter(args.contract_out.iter().map(|s| Symbol::new(s)));
    for filename in &args.infiles {
        info!("Reading processes from {filename:?}");
        let file = File::open(filename)
            .with_context(|| format!("Failed to read {filename:?}"))?;
        let processes = read_processes(BufReader::new(file))
            .with_context(|| format!("Reading from {filename:?}"))?;
        for (n, process) in processes.into_iter().enumerate() {
            let name = process.name.clone().unwrap_or_else(|| n.to_string());
            debug!("Process {name}: {}", process.correlator);
            let fields = process
                .fields()
                .with_context(|| format!("Parsing correlator of process {name}"))?;
            let mut naming = Naming::default();
            let mut diagrams = process
                .calculator()
                .contract(fields, &mut naming)
                .with_context(|| format!("Contracting process {name}"))?;
            for (_, dia) in &mut diagrams {
                for &particle in &heavy {
                    dia.contract_out(particle);
                }
            }
            info!("Process {name}: {} diagrams", diagrams.len());
            write(&mut out, &name, &diagrams, args.format)
                .with_context(|| "Failed to write output")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.loglevel)
        .init();
    info!("{NAME} {}", *VERSION_STRING);

    if let Some(filename) = &args.outfile {
        let out = BufWriter::new(
            File::create(filename)
                .with_context(|| format!("Failed to create {filename:?}"))?,
        );
        write_diagrams(args, out)
    } else {
        write_diagrams(args, std::io::stdout())
    }
}
