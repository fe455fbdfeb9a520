//! Tessera CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, debug};

use tessera::cli::args::{Command, TesseraArgs};
use tessera::cli::commands::execute_command;

/// Exit status when a query ran out of its time budget.
const EXIT_TIMEOUT: i32 = 2;

fn log_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// The files a command reads and writes, for the startup log line.
fn describe(command: &Command) -> String {
    match command {
        Command::Build(args) => format!(
            "build {} -> {}",
            args.journal.display(),
            args.index_dir.display()
        ),
        Command::Inspect(args) => format!("inspect {}", args.index_dir.display()),
        Command::Search(args) => format!(
            "search {} for {} terms",
            args.index_dir.display(),
            args.query.len()
        ),
        Command::JournalInfo(args) => format!("journal-info {}", args.journal.display()),
        Command::JournalImport(args) => format!(
            "journal-import {} -> {}",
            args.input.display(),
            args.journal.display()
        ),
    }
}

fn main() {
    let args = TesseraArgs::parse();

    // RUST_LOG refines the level picked by -v/-q
    Builder::new()
        .filter_level(log_level(args.verbosity()))
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "tessera [{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    debug!("tessera {}: {}", tessera::VERSION, describe(&args.command));

    if let Err(e) = execute_command(args) {
        eprintln!("tessera: {e}");
        let code = if e.is_timeout() { EXIT_TIMEOUT } else { 1 };
        process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), LevelFilter::Error);
        assert_eq!(log_level(2), LevelFilter::Info);
        assert_eq!(log_level(9), LevelFilter::Debug);
    }

    #[test]
    fn test_describe_names_paths() {
        let args = TesseraArgs::parse_from(["tessera", "build", "j", "out"]);
        assert_eq!(describe(&args.command), "build j -> out");

        let args = TesseraArgs::parse_from(["tessera", "journal-info", "pages"]);
        assert_eq!(describe(&args.command), "journal-info pages");
    }
}
