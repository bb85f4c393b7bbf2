use anyhow::Result;
use std::path::PathBuf;

use photolog::config::Config;
use photolog::db::Database;
use photolog::gallery::GallerySync;
use photolog::logging;
use photolog::scanner::Scanner;

enum Command {
    Catalog { directory: PathBuf, refresh: bool },
    Gallery { refresh: bool, files: Vec<String> },
}

struct Args {
    command: Command,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut refresh = false;
    let mut command_name: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photolog {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--refresh" | "-r" => refresh = true,
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {arg}");
                print_help();
                std::process::exit(1);
            }
            arg => {
                if command_name.is_none() {
                    command_name = Some(arg.to_string());
                } else {
                    positional.push(arg.to_string());
                }
            }
        }
        i += 1;
    }

    let command = match command_name.as_deref() {
        Some("catalog") => {
            let Some(directory) = positional.first() else {
                eprintln!("Error: catalog requires a directory argument");
                std::process::exit(1);
            };
            Command::Catalog {
                directory: PathBuf::from(directory),
                refresh,
            }
        }
        Some("gallery") => Command::Gallery {
            refresh,
            files: positional,
        },
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Args {
        command,
        config_path,
    }
}

fn print_help() {
    println!(
        r#"photolog - photo metadata catalog and gallery sync

USAGE:
    photolog catalog DIRECTORY [--refresh]
    photolog gallery [--refresh] [FILE...]

COMMANDS:
    catalog    Recursively extract metadata from DIRECTORY into the catalog,
               skipping files whose modification time has not changed
    gallery    Sync the gallery table from the published photo directory.
               FILE arguments force re-processing of just those files

OPTIONS:
    --refresh, -r       Re-process everything, ignoring change detection
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOLOG_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photolog/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init();

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.db_path)?;
    db.initialize()?;

    match args.command {
        Command::Catalog { directory, refresh } => {
            let summary = Scanner::new(config).scan_directory(&directory, &db, refresh)?;
            println!(
                "Finished. Found {} images, processed {}, skipped {}, errors {}.",
                summary.total_found, summary.processed, summary.skipped, summary.errors
            );
            if summary.failed_batches > 0 {
                eprintln!("{} batch upserts failed; see log output.", summary.failed_batches);
                std::process::exit(1);
            }
        }
        Command::Gallery { refresh, files } => {
            let summary = GallerySync::new(config).sync(&db, refresh, &files)?;
            println!(
                "Finished. Processed {}, skipped {}, missing URLs {}.",
                summary.processed, summary.skipped_existing, summary.missing_urls
            );
        }
    }

    Ok(())
}
