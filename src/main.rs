use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

use burstline::config::Config;
use burstline::db::{Database, TagCategory};
use burstline::export::{export_sessions, ExportFormat};
use burstline::ingest::Ingestor;
use burstline::{logging, ExifExtractor, MemoryCache, MergeOutcome, Restructurer, TimeResolver, ViewCache, Views};

enum Command {
    Ingest {
        directory: PathBuf,
        event: String,
        year: i32,
        day: String,
        date: NaiveDate,
        source: Option<String>,
    },
    Split { burst_id: String, photo_id: i64 },
    Merge { target: String, source: String },
    Hero { burst_id: String, photo_id: Option<i64> },
    Reject { photo_id: i64, undo: bool },
    Hide { burst_id: String, undo: bool },
    Tag {
        burst_id: String,
        category: TagCategory,
        label: String,
        remove: bool,
    },
    Resolve { photo_id: i64 },
    Fingerprint,
    Gallery { hide_heroes: bool, force: bool },
    Stats { force: bool },
    Export { path: PathBuf, format: ExportFormat },
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut flags: Vec<String> = Vec::new();
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("burstline {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            "--event" | "--year" | "--day" | "--date" | "--source" | "--format" => {
                if i + 1 < args.len() {
                    flags.push(args[i].clone());
                    flags.push(args[i + 1].clone());
                    i += 1;
                } else {
                    usage_error(&format!("{} requires a value", args[i]));
                }
            }
            "--hide-heroes" | "--force" | "--undo" | "--remove" => flags.push(args[i].clone()),
            arg if arg.starts_with('-') => usage_error(&format!("unknown option {}", arg)),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    match build_command(&positional, &flags) {
        Ok(command) => Cli { config_path, command },
        Err(e) => usage_error(&e.to_string()),
    }
}

fn flag_value<'a>(flags: &'a [String], name: &str) -> Option<&'a str> {
    flags
        .windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

fn has_flag(flags: &[String], name: &str) -> bool {
    flags.iter().any(|f| f == name)
}

fn parse_id(value: Option<&String>, what: &str) -> Result<i64> {
    let value = value.ok_or_else(|| anyhow!("missing {}", what))?;
    value
        .parse()
        .with_context(|| format!("{} must be a number, got {:?}", what, value))
}

fn required(value: Option<&String>, what: &str) -> Result<String> {
    value.cloned().ok_or_else(|| anyhow!("missing {}", what))
}

fn build_command(positional: &[String], flags: &[String]) -> Result<Command> {
    let Some(name) = positional.first() else {
        bail!("no command given");
    };
    let arg = |n: usize| positional.get(n);

    let command = match name.as_str() {
        "ingest" => {
            let date = flag_value(flags, "--date").ok_or_else(|| anyhow!("ingest needs --date"))?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("--date must be YYYY-MM-DD, got {:?}", date))?;
            let year = match flag_value(flags, "--year") {
                Some(year) => year.parse().with_context(|| format!("bad --year {:?}", year))?,
                None => chrono::Datelike::year(&date),
            };
            Command::Ingest {
                directory: PathBuf::from(required(arg(1), "directory")?),
                event: flag_value(flags, "--event")
                    .ok_or_else(|| anyhow!("ingest needs --event"))?
                    .to_string(),
                year,
                day: flag_value(flags, "--day")
                    .ok_or_else(|| anyhow!("ingest needs --day"))?
                    .to_string(),
                date,
                source: flag_value(flags, "--source").map(str::to_string),
            }
        }
        "split" => Command::Split {
            burst_id: required(arg(1), "burst id")?,
            photo_id: parse_id(arg(2), "pivot photo id")?,
        },
        "merge" => Command::Merge {
            target: required(arg(1), "target burst id")?,
            source: required(arg(2), "source burst id")?,
        },
        "hero" => Command::Hero {
            burst_id: required(arg(1), "burst id")?,
            photo_id: match arg(2).map(String::as_str) {
                Some("none") => None,
                _ => Some(parse_id(arg(2), "photo id")?),
            },
        },
        "reject" => Command::Reject {
            photo_id: parse_id(arg(1), "photo id")?,
            undo: has_flag(flags, "--undo"),
        },
        "hide" => Command::Hide {
            burst_id: required(arg(1), "burst id")?,
            undo: has_flag(flags, "--undo"),
        },
        "tag" => Command::Tag {
            burst_id: required(arg(1), "burst id")?,
            category: required(arg(2), "tag category")?.parse()?,
            label: required(arg(3), "tag label")?,
            remove: has_flag(flags, "--remove"),
        },
        "resolve" => Command::Resolve {
            photo_id: parse_id(arg(1), "photo id")?,
        },
        "fingerprint" => Command::Fingerprint,
        "gallery" => Command::Gallery {
            hide_heroes: has_flag(flags, "--hide-heroes"),
            force: has_flag(flags, "--force"),
        },
        "stats" => Command::Stats {
            force: has_flag(flags, "--force"),
        },
        "export" => Command::Export {
            path: PathBuf::from(required(arg(1), "output path")?),
            format: ExportFormat::from_name(flag_value(flags, "--format").unwrap_or("json"))?,
        },
        other => bail!("unknown command {:?}", other),
    };
    Ok(command)
}

fn print_help() {
    println!(
        r#"burstline - burst photo session timeline

USAGE:
    burstline [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    ingest DIR --event NAME --day NAME --date YYYY-MM-DD [--year N] [--source TAG]
                            Import a burst directory as a session
    split BURST PHOTO       Split a session, PHOTO starting the new one
    merge TARGET SOURCE     Move every photo of SOURCE into TARGET
    hero BURST PHOTO|none   Choose or clear the hero photo
    reject PHOTO [--undo]   Mark a photo rejected
    hide BURST [--undo]     Leave a session out of gallery and stats
    tag BURST CATEGORY LABEL [--remove]
                            Add or remove a people|activity|location|misc tag
    resolve PHOTO           Print the resolved capture instant of a photo
    fingerprint             Print the current cache fingerprint
    gallery [--hide-heroes] [--force]
                            Print the gallery listing as JSON
    stats [--force]         Print the statistics bundle as JSON
    export PATH [--format json|csv]
                            Export sessions (PATH without extension gets one)

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    BURSTLINE_CONFIG    Path to config file (overrides default location)
    BURSTLINE_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/burstline/config.toml"#
    );
}

fn session_id(db: &Database, burst_id: &str) -> Result<i64> {
    db.get_session_by_burst_id(burst_id)?
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no session with burst id {}", burst_id))
}

fn run(command: Command, config: &Config, db: &Database) -> Result<()> {
    let resolver = TimeResolver::from_config(&config.event)?.with_extractor(Box::new(ExifExtractor));
    let engine = Restructurer::from_config(db, &resolver, config);

    match command {
        Command::Ingest {
            directory,
            event,
            year,
            day,
            date,
            source,
        } => {
            let event_id = db.create_event(&event, year)?;
            let day_id = match db.find_day(event_id, &day)? {
                Some(existing) => existing.id,
                None => db.create_day(event_id, &day, date)?,
            };
            let extractor = ExifExtractor;
            let ingestor = Ingestor::new(db, &resolver, &extractor, config.ingest.image_extensions.clone());
            let report = ingestor.ingest_directory(day_id, &directory, source.as_deref())?;
            println!(
                "Ingested {} photos into {} ({} with capture time)",
                report.photos, report.burst_id, report.timed
            );
        }
        Command::Split { burst_id, photo_id } => {
            let session = session_id(db, &burst_id)?;
            match engine.split(session, photo_id) {
                Ok(created) => println!("Created {} with {} photos", created.burst_id, created.photo_count),
                Err(e) => {
                    for message in e.messages() {
                        eprintln!("{}", message);
                    }
                    std::process::exit(2);
                }
            }
        }
        Command::Merge { target, source } => {
            let target = session_id(db, &target)?;
            let source = session_id(db, &source)?;
            match engine.merge(target, source) {
                MergeOutcome::Merged { moved } => println!("Moved {} photos", moved),
                MergeOutcome::RolledBack(reason) => {
                    eprintln!("Merge rolled back: {}", reason);
                    std::process::exit(2);
                }
            }
        }
        Command::Hero { burst_id, photo_id } => {
            db.set_hero(session_id(db, &burst_id)?, photo_id)?;
        }
        Command::Reject { photo_id, undo } => {
            db.set_rejected(photo_id, !undo)?;
        }
        Command::Hide { burst_id, undo } => {
            db.set_hidden(session_id(db, &burst_id)?, !undo)?;
        }
        Command::Tag {
            burst_id,
            category,
            label,
            remove,
        } => {
            let session = session_id(db, &burst_id)?;
            if remove {
                db.remove_tag(session, category, &label)?;
            } else {
                db.add_tag(session, category, &label)?;
            }
        }
        Command::Resolve { photo_id } => match engine.resolve_capture_instant(photo_id)? {
            Some(instant) => println!("{}", instant.to_rfc3339()),
            None => bail!("photo {} not found", photo_id),
        },
        Command::Fingerprint => {
            println!("{}", burstline::fingerprint(db.connection())?);
        }
        Command::Gallery { hide_heroes, force } => {
            let store = Arc::new(MemoryCache::bounded(config.cache.max_entries));
            let cache = ViewCache::from_config(store, &config.cache);
            let views = Views::from_config(db, &cache, config)?;
            println!("{}", serde_json::to_string_pretty(&views.gallery(hide_heroes, force)?)?);
        }
        Command::Stats { force } => {
            let store = Arc::new(MemoryCache::bounded(config.cache.max_entries));
            let cache = ViewCache::from_config(store, &config.cache);
            let views = Views::from_config(db, &cache, config)?;
            println!("{}", views.stats(force)?.serialized_json);
        }
        Command::Export { mut path, format } => {
            if path.extension().is_none() {
                path.set_extension(format.extension());
            }
            let count = export_sessions(db, &path, format)?;
            println!("Exported {} sessions to {}", count, path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match cli.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.db_path)?;
    db.initialize()?;

    run(cli.command, &config, &db)
}
