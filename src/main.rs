//! Command-line front end: open a file, apply an edit script, and dump the result

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::SetLoggerError;
use piecebuf::script::{hex_dump, Edit, ScriptError};
use piecebuf::{logger, ByteArrayModel, Config, ConfigError, ModelError, ModelHandle, ReloadError};
use std::io;
use std::path::PathBuf;
use std::process::exit;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to install logger: {0}")]
    Logger(#[from] SetLoggerError),
    #[error("failed to open log file {}: {cause}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error(transparent)]
    Reload(#[from] ReloadError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("edit `{edit}` failed: {cause}")]
    Edit {
        edit: String,
        #[source]
        cause: ModelError,
    },
}

fn main() {
    let matches = generate_clap_app().get_matches();

    if let Err(e) = run(&matches) {
        log::error!("{}", e);
        eprintln!("piecebuf: {}", e);
        exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    setup_logging(matches, &config)?;

    // Parse the whole script up front, so that a typo doesn't leave us halfway through
    let edits = matches
        .get_many::<String>("EDITS")
        .into_iter()
        .flatten()
        .map(|s| Ok((s.as_str(), s.parse::<Edit>()?)))
        .collect::<Result<Vec<_>, ScriptError>>()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let path = matches
        .get_one::<String>("FILE")
        .map(PathBuf::from)
        .unwrap_or_default();

    let mut handle = runtime.block_on(ModelHandle::open(path, config))?;

    for (text, edit) in edits {
        log::debug!("applying `{}`", text);
        edit.apply(handle.model_mut())
            .map_err(|cause| CliError::Edit {
                edit: text.to_owned(),
                cause,
            })?;
    }

    let changes = handle.model_mut().take_notifications().len();
    print!("{}", hex_dump(&handle.model().to_vec(), 0));

    if matches.get_flag("stats") {
        let table = handle.model();
        eprintln!(
            "{} bytes, {} pieces, {} changes, {} undoable",
            table.size(),
            table.piece_count(),
            changes,
            table.history().undo_depth()
        );
    }

    Ok(())
}

fn setup_logging(matches: &ArgMatches, config: &Config) -> Result<(), CliError> {
    let path = match matches.get_one::<String>("log-file") {
        Some(p) => PathBuf::from(p),
        None => return Ok(()),
    };

    logger::init()?;

    let level = match matches.get_one::<String>("log-level") {
        Some(level) => level.parse().unwrap_or(config.log_level),
        None => config.log_level,
    };
    logger::set_level(level);

    logger::set_file_path(&path).map_err(|cause| CliError::LogFile { path, cause })?;
    log::info!("logging initialized at level {}", level);
    Ok(())
}

/// Generates the `clap` application
#[rustfmt::skip]
fn generate_clap_app() -> Command {
    Command::new("piecebuf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Applies edits to a file through a piece table and prints the result as a hex dump")
        .arg(Arg::new("config")
            .long("config")
            .value_name("FILE")
            .help("Sets the YAML config file to use")
        )
        .arg(Arg::new("log-file")
            .long("log-file")
            .value_name("FILE")
            .help("Optionally enables logging to a file")
        )
        .arg(Arg::new("log-level")
            .long("log-level")
            .help("Sets the level of log output to provide")
            .long_help(concat!(
                "Sets the level of log output to provide.\n",
                r#"Defaults to "Warn" - i.e. excluding "Trace", "Debug", and "Info" messages."#,
                " This can also be provided by the 'log_level' field in the configuration file",
            ))
            .requires("log-file")
            .value_parser(["Off", "Trace", "Debug", "Info", "Warn", "Error"])
        )
        .arg(Arg::new("stats")
            .long("stats")
            .action(ArgAction::SetTrue)
            .help("Prints a summary of the table to stderr")
        )
        .arg(Arg::new("FILE")
            .required(true)
            .help("The file to open")
        )
        .arg(Arg::new("EDITS")
            .num_args(1..)
            .help("Edits to apply, in order (e.g. `insert:0:hello`, `remove:2:5`, `undo`)")
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn second_logger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("piecebuf.log");
        let matches = generate_clap_app()
            .try_get_matches_from([
                OsStr::new("piecebuf"),
                OsStr::new("--log-file"),
                log_file.as_os_str(),
                OsStr::new("data.bin"),
            ])
            .unwrap();

        // Something else got there first
        logger::init().unwrap();

        match setup_logging(&matches, &Config::default()) {
            Err(CliError::Logger(_)) => (),
            other => panic!("expected a logger error, got {:?}", other),
        }
        assert!(!log_file.exists());
    }
}
