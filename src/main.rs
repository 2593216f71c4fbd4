use anyhow::Context;
use clap::{Arg, Command};
use log::LevelFilter;
use nel_collector::{Collector, Config};
use std::path::{Path, PathBuf};
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("nel-collector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Self hosted endpoint for HTTP Report-To, NEL, Expect-CT and DMARC reports")
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("FILE")
                .help("Also append metric lines to this file instead of only stdout")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("forensics")
                .long("forensics")
                .value_name("DIR")
                .help("Base directory for forensic request dumps")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(clap::value_parser!(u16))
                .default_value("9390"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .help("Address to listen on")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Noise filter configuration file (built-in rules when omitted)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the default configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Check that the configuration loads and its patterns compile")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging of rejected and filtered reports")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match load_config(matches.get_one::<String>("config")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        match nel_collector::Classifier::new(&config) {
            Ok(classifier) => {
                println!(
                    "Configuration OK: {} noise filter rules",
                    classifier.noise_filter().rules().len()
                );
            }
            Err(e) => {
                eprintln!("Configuration validation failed: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    let log_path = matches.get_one::<String>("log").map(Path::new);
    let forensics_root = matches.get_one::<String>("forensics").map(PathBuf::from);

    let collector = match Collector::from_config(&config, log_path, forensics_root) {
        Ok(collector) => collector,
        Err(e) => {
            eprintln!("Error starting collector: {e:#}");
            process::exit(1);
        }
    };

    let port = *matches.get_one::<u16>("port").unwrap_or(&9390);
    let bind = matches
        .get_one::<String>("bind")
        .map(String::as_str)
        .unwrap_or("0.0.0.0");
    let addr = format!("{bind}:{port}");

    log::info!("Starting nel-collector v{}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = collector.run(&addr).await {
        log::error!("Collector error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: Option<&String>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load {path}"))?;
            log::info!(
                "Loaded {} noise filter rules from {path}",
                config.noise_filter.len()
            );
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Add deployment-specific noise rules as needed.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
