use anyhow::{Context, Result};
use capscope::cli::{Args, Command};
use capscope::commands;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Exit status: 0 success, 1 comparison found differences, 2 any error.
fn main() {
    let code = match run() {
        Ok(different) => {
            if different {
                1
            } else {
                0
            }
        }
        Err(err) => {
            eprintln!("capscope: {err:#}");
            2
        }
    };
    std::process::exit(code);
}

fn run() -> Result<bool> {
    let args = Args::parse();

    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("capscope=debug")
    } else {
        EnvFilter::new("capscope=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut different = false;
    let rendered = match &args.command {
        Command::Analyze {
            bundle,
            packages,
            format,
        } => commands::analyze::run(&args, bundle, packages.as_deref(), *format)?,
        Command::Compare {
            baseline,
            bundle,
            packages,
        } => {
            let (text, diff) =
                commands::compare::run(&args, baseline, bundle, packages.as_deref())?;
            different = diff;
            text
        }
        Command::Graph { bundle, packages } => {
            commands::graph::run(&args, bundle, packages.as_deref())?
        }
        Command::Map => commands::map::run(&args)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing output to {path}"))?;
            eprintln!("Results written to: {path}");
        }
        None => print!("{rendered}"),
    }
    Ok(different)
}
