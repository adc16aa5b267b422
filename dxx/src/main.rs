use std::process::ExitCode;

use indicatif::MultiProgress;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*};

use crate::args::{OutputFormat, ValidatedCommand};
use crate::error::{AppError, AppErrorKind};
use crate::progress::IndicatifWriter;

mod args;
mod clean;
mod error;
mod fetch;
mod progress;

fn setup_logging(verbose: u8, mp: &MultiProgress) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let directives = format!("dxx={level},fetch_archive={level}");
    // Explicit -v flags take precedence over RUST_LOG
    let env_filter = if verbose > 0 {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(directives)
    } else {
        let env_directives = std::env::var("RUST_LOG").unwrap_or_default();
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(format!("{directives},{env_directives}"))
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(IndicatifWriter::new(mp.clone()))
        .with_target(level >= LevelFilter::DEBUG)
        .without_time();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn list(config: &fetch_archive::config::Config, format: Option<OutputFormat>) -> Result<(), AppError> {
    match format {
        Some(OutputFormat::Json) => {
            let json = serde_json::to_string_pretty(config.packages())
                .map_err(|e| AppError::output("json", e))?;
            println!("{json}");
        }
        Some(OutputFormat::Toml) => {
            #[derive(serde::Serialize)]
            struct Listing<'a> {
                package_name: &'a std::collections::BTreeMap<String, String>,
            }
            let text = toml::to_string(&Listing {
                package_name: config.packages(),
            })
            .map_err(|e| AppError::output("toml", e))?;
            print!("{text}");
        }
        None => {
            if config.packages().is_empty() {
                println!("No packages configured in {}", fetch_archive::config::CONFIG_FILE);
            }
            for (name, url) in config.packages() {
                println!("{name}: {url}");
            }
        }
    }
    Ok(())
}

fn run(args: args::ValidatedArgs, mp: &MultiProgress) -> Result<(), AppError> {
    match args.command {
        ValidatedCommand::Download {
            sources,
            sources_dir,
            timeout,
        } => {
            tracing::debug!("extracting into {}", sources_dir.display());
            let results = fetch::parallel_fetch(&sources, &sources_dir, timeout, mp);
            let mut success = 0usize;
            for result in &results {
                match result {
                    Ok(artefact) => {
                        println!(
                            "✅ 📦 Extracted {} into {}",
                            artefact.source().url(),
                            artefact.path().display()
                        );
                        success += 1;
                    }
                    Err(fetch_error) => {
                        eprintln!("❌ {fetch_error:#}");
                    }
                }
            }
            println!("\n🎉 Successfully fetched {success} of {} source(s)!", results.len());
            if success < results.len() {
                return Err(AppError::fetch());
            }
            Ok(())
        }
        ValidatedCommand::List { config, format } => list(&config, format),
        ValidatedCommand::Clean {
            project_dir,
            sources_dir,
        } => {
            let removed = clean::clean(&project_dir, sources_dir.as_deref())?;
            if removed.is_empty() {
                println!("Project is already clean.");
            } else {
                for path in &removed {
                    println!("🧹 Removed {}", path.display());
                }
                println!("Cleaning complete. Removed {} item(s).", removed.len());
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let mp = MultiProgress::new();
    let result = args::parse().and_then(|args| {
        setup_logging(args.verbose, &mp);
        run(args, &mp)
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if *err.error_kind() != AppErrorKind::Fetch {
                eprintln!("Error: {err}");
                let mut source = std::error::Error::source(&err);
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            }
            err.into()
        }
    }
}
