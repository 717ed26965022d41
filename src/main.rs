use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use property_valuation::cli::{run, Cli};

// Entry point
// 1. Load model, reference dataset and training columns (fail fast if any is missing)
// 2. Turn the command-line inputs into a property request
// 3. Build the feature record and predict
// 4. Print the estimate in crores

fn main() -> Result<()> {
    let directive: Directive = "property_valuation=info".parse()?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();

    run(cli)
}
