use clap::Parser;
use dex_render::cli::{format_objects, render_dex, Cli, CliError};
use std::process;
use tracing::info;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        // Logging may not be initialized yet.
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = cli.render_config()?;
    config.log.try_init()?;

    let objects = render_dex(&config)?;
    let output = format_objects(&objects.to_create, cli.output_format)?;
    print!("{output}");
    info!(
        created = objects.to_create.len(),
        deleted = objects.to_delete.len(),
        "manifest written"
    );
    Ok(())
}
