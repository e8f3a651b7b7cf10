use clap::Parser;
use tracing_subscriber::EnvFilter;

use nodres::{Cli, Config, Nodres};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    if let Err(err) = run(&cli) {
        eprintln!("Unable to complete request: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let app = Nodres::new(config);
    let user = whoami::username();

    let output = app.run(&cli.command, &user)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "nodres=info",
        2 => "nodres=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
