use std::path::PathBuf;

use clap::Parser;

use crate::writer::OutFormat;

/// Generate Feynman diagrams from correlators of quantum fields
#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
#[clap(version = crate::version::VERSION_STRING.as_str())]
pub(crate) struct Args {
    /// Format of the generated diagrams.
    #[clap(short, long, value_enum, default_value_t = OutFormat::Yaml)]
    pub(crate) format: OutFormat,

    /// Where to write the diagrams. Defaults to standard output.
    #[clap(short, long, value_name = "FILE")]
    pub(crate) outfile: Option<PathBuf>,

    /// Shrink internal propagators of the given particles to a point.
    ///
    /// Can be given multiple times.
    #[clap(short, long)]
    pub(crate) contract_out: Vec<String>,

    /// Process files. Each YAML document describes one correlator.
    #[clap(required = true)]
    pub(crate) infiles: Vec<PathBuf>,

    /// Log filter, e.g. `debug` or `feynwick::wick=trace`.
    ///
    /// Plain levels are 'off', 'error', 'warn', 'info', 'debug' and
    /// 'trace', in order of increasing output.
    #[clap(short, long, default_value = "info")]
    pub(crate) loglevel: String,
}
