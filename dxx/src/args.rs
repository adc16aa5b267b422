use std::path::PathBuf;
use std::time::Duration;

use clap::FromArgMatches;
use clap::{CommandFactory, Parser};

use fetch_archive::ArchiveSource;
use fetch_archive::config::{self, Config};

use crate::error::AppError;

// Shamelessly borrowed from https://github.com/crate-ci/clap-cargo/blob/0378657ffdf2b67bcd6f1ab56e04a1322b92dd0e/src/style.rs
// thanks to https://stackoverflow.com/a/79614957
use anstyle::AnsiColor::*;
use anstyle::Effects;
use anstyle::Style;

const HEADER: Style = Green.on_default().effects(Effects::BOLD);
const USAGE: Style = Green.on_default().effects(Effects::BOLD);
const LITERAL: Style = Cyan.on_default().effects(Effects::BOLD);
const PLACEHOLDER: Style = Cyan.on_default();
const ERROR: Style = Red.on_default().effects(Effects::BOLD);
const VALID: Style = Cyan.on_default().effects(Effects::BOLD);
const INVALID: Style = Yellow.on_default().effects(Effects::BOLD);

const APP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(HEADER)
    .usage(USAGE)
    .literal(LITERAL)
    .placeholder(PLACEHOLDER)
    .error(ERROR)
    .valid(VALID)
    .invalid(INVALID);

/// Environment variable overriding the download cache location.
const DOWNLOAD_DIR_ENV: &str = "DXX_DOWNLOAD_DIR";

#[derive(Debug, Parser)]
#[command(name = "dxx")]
#[command(about = "Fetch the source archives a project depends on")]
#[command(long_about = None)]
#[command(styles = APP_STYLING)]
#[command(term_width = 80)]
struct Args {
    /// Increase logging verbosity (-v, -vv, -vvv). `RUST_LOG` is used when not given.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Download packages by name (from dxx.toml) or directly by URL, and extract them
    Download {
        /// Package names from the `[package_name]` table, or http(s) URLs
        #[arg(value_name = "PACKAGE_OR_URL", required = true)]
        packages: Vec<String>,

        /// Project directory containing dxx.toml. Defaults to the current directory.
        #[arg(long = "project-dir", short = 'C', value_name = "PATH")]
        project_dir: Option<PathBuf>,

        /// Directory the sources are extracted into. If omitted, use `<download dir>/sources`
        /// where the download dir comes from `DXX_DOWNLOAD_DIR`, then `[download] dir` in
        /// dxx.toml, then `~/.dxx/downloads`.
        #[arg(long = "dest", short = 'd', value_name = "PATH")]
        dest: Option<PathBuf>,

        /// Seconds a connection or read may stall before giving up. Defaults to
        /// `[download] timeout` or 60.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Number of downloads to run at once. Defaults to one per logical CPU.
        #[arg(long, short = 'j', value_name = "NUM-JOBS")]
        jobs: Option<u32>,
    },
    /// List the packages configured in dxx.toml
    List {
        /// Project directory containing dxx.toml. Defaults to the current directory.
        #[arg(long = "project-dir", short = 'C', value_name = "PATH")]
        project_dir: Option<PathBuf>,

        /// Output format
        #[arg(long, short = 'f', value_enum, value_name = "FORMAT")]
        format: Option<OutputFormat>,
    },
    /// Remove .dxx directories from the project and stale scratch directories from the cache
    Clean {
        /// Project directory to clean. Defaults to the current directory.
        #[arg(long = "project-dir", short = 'C', value_name = "PATH")]
        project_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Output in JSON format
    Json,
    /// Output in TOML format
    Toml,
}

#[derive(Debug)]
pub struct ValidatedArgs {
    pub verbose: u8,
    pub command: ValidatedCommand,
}

#[derive(Debug)]
pub enum ValidatedCommand {
    Download {
        sources: Vec<ArchiveSource>,
        sources_dir: PathBuf,
        timeout: Duration,
    },
    List {
        config: Config,
        format: Option<OutputFormat>,
    },
    Clean {
        project_dir: PathBuf,
        sources_dir: Option<PathBuf>,
    },
}

impl ValidatedArgs {
    fn detect_project_dir(arg: Option<PathBuf>) -> Result<PathBuf, AppError> {
        match arg {
            Some(dir) if !dir.is_dir() => Err(AppError::arg_validation(format!(
                "project directory does not exist: {}",
                dir.display()
            ))),
            Some(dir) => Ok(dir),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Detect the download directory, falling back to `DXX_DOWNLOAD_DIR`, then the project
    /// configuration, then ~/.dxx/downloads
    fn detect_download_dir(config: &Config) -> Result<PathBuf, AppError> {
        if let Some(dir) = std::env::var_os(DOWNLOAD_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = config.download_dir() {
            return Ok(dir.to_path_buf());
        }
        let base_dirs = directories::BaseDirs::new().ok_or(AppError::arg_validation(
            "could not determine home directory".to_string(),
        ))?;
        Ok(base_dirs.home_dir().join(".dxx").join("downloads"))
    }
}

impl TryFrom<Command> for ValidatedCommand {
    type Error = AppError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        match command {
            Command::Download {
                packages,
                project_dir,
                dest,
                timeout,
                jobs,
            } => {
                let project_dir = ValidatedArgs::detect_project_dir(project_dir)?;
                let config = Config::load(&project_dir)?;
                let sources = packages
                    .iter()
                    .map(|package| config.resolve(package))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut names = std::collections::HashSet::new();
                if let Some(duplicate) = sources.iter().find(|s| !names.insert(s.name())) {
                    return Err(AppError::arg_validation(format!(
                        "more than one source would be extracted to '{}'",
                        duplicate.name()
                    )));
                }

                let sources_dir = match dest {
                    Some(dir) => dir,
                    None => config::sources_dir(ValidatedArgs::detect_download_dir(&config)?),
                };

                let timeout = match timeout {
                    Some(0) => {
                        return Err(AppError::arg_validation(
                            "timeout must be at least one second".to_string(),
                        ));
                    }
                    Some(secs) => Duration::from_secs(secs),
                    None => config.timeout().unwrap_or(fetch_archive::DEFAULT_TIMEOUT),
                };

                if let Some(jobs) = jobs {
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(jobs as usize)
                        .build_global()
                        .map_err(|e| {
                            AppError::arg_validation(format!("Failed to set job count: {e}"))
                        })?;
                }

                Ok(ValidatedCommand::Download {
                    sources,
                    sources_dir,
                    timeout,
                })
            }
            Command::List {
                project_dir,
                format,
            } => {
                let project_dir = ValidatedArgs::detect_project_dir(project_dir)?;
                Ok(ValidatedCommand::List {
                    config: Config::load(&project_dir)?,
                    format,
                })
            }
            Command::Clean { project_dir } => {
                let project_dir = ValidatedArgs::detect_project_dir(project_dir)?;
                // A broken dxx.toml shouldn't stop the project being cleaned
                let sources_dir = Config::load(&project_dir)
                    .ok()
                    .and_then(|config| ValidatedArgs::detect_download_dir(&config).ok())
                    .map(config::sources_dir);
                Ok(ValidatedCommand::Clean {
                    project_dir,
                    sources_dir,
                })
            }
        }
    }
}

pub fn parse() -> Result<ValidatedArgs, AppError> {
    let matches = Args::command()
        .version(env!("CARGO_PKG_VERSION"))
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => {
            err.format(&mut Args::command()).exit();
        }
    };
    Ok(ValidatedArgs {
        verbose: args.verbose,
        command: ValidatedCommand::try_from(args.command)?,
    })
}
