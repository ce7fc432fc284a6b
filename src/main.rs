use std::process;

#[macro_use]
extern crate lazy_static;

use clap::{App, Arg, ArgMatches};
use log::{error, info, LevelFilter};

mod config;
use config::{load_parameters, DriverApiParameters, ExtractionPolicy};

mod ergast;
use ergast::seasons::current_year;

mod error;
use error::{Error, Result};

mod frame;
use frame::{rows_per_season, write_parquet, FrameContext};

mod pipeline;
use pipeline::{create_drivers_data, NODE_INPUT, NODE_NAME, NODE_OUTPUT, NODE_TAGS};

mod transport;
use transport::UreqTransport;

#[cfg(test)]
mod testing;

fn command_usage<'a, 'b>() -> App<'a, 'b> {
    const DEFAULT_PARAMETERS: &str = "config/parameters.toml";

    App::new("f1-data-acquisition")
    .author("Matthew Scheffel <matt@dataheck.com>")
    .about("Loads historical Formula 1 driver listings from the Ergast API")
    .arg(
        Arg::with_name("parameters")
            .takes_value(true)
            .help("Location of the pipeline parameters (TOML, table [catalog_info_drivers_api])")
            .default_value(DEFAULT_PARAMETERS)
    )
    .arg(
        Arg::with_name("output")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("Write the drivers table to this Parquet file. Without it, only a summary is printed.")
    )
    .arg(
        Arg::with_name("min-year")
            .long("min-year")
            .takes_value(true)
            .help("First season to fetch, overriding min_year from the parameters")
    )
    .arg(
        Arg::with_name("current-year")
            .long("current-year")
            .takes_value(true)
            .help("Treat this as the current season (exclusive upper bound). Defaults to the calendar year.")
    )
    .arg(
        Arg::with_name("http-timeout")
            .long("http-timeout")
            .takes_value(true)
            .help("HTTP connect and receive timeout in seconds, overriding timeout_secs. Ergast can be very slow.")
    )
    .arg(
        Arg::with_name("on-malformed")
            .long("on-malformed")
            .takes_value(true)
            .possible_values(&["abort", "skip"])
            .help("What to do with a driver entry missing a required field")
    )
    .arg(
        Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .help("Log every request")
    )
}

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    match matches.value_of(name) {
        Some(v) => match v.parse::<T>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => Err(Error::Config(format!("Invalid {} specified: '{}'.", name, v))),
        },
        None => Ok(None),
    }
}

fn apply_overrides(mut params: DriverApiParameters, matches: &ArgMatches) -> Result<DriverApiParameters> {
    if let Some(min_year) = parse_number::<i32>(matches, "min-year")? {
        params.min_year = min_year;
    }
    if let Some(timeout) = parse_number::<u64>(matches, "http-timeout")? {
        if timeout == 0 {
            return Err(Error::Config("http-timeout must be greater than zero.".to_owned()));
        }
        params.timeout_secs = timeout;
    }
    if let Some(policy) = matches.value_of("on-malformed") {
        params.on_malformed = policy.parse::<ExtractionPolicy>()?;
    }

    Ok(params)
}

fn run(matches: &ArgMatches) -> Result<()> {
    let parameters_path = matches.value_of("parameters").unwrap_or("config/parameters.toml");
    let params = apply_overrides(load_parameters(parameters_path)?, matches)?;
    let until_year = parse_number::<i32>(matches, "current-year")?.unwrap_or_else(current_year);

    info!("Running node {} [{}]: {} -> {}", NODE_NAME, NODE_TAGS.join(", "), NODE_INPUT, NODE_OUTPUT);

    let context = FrameContext::new(NODE_NAME);
    let transport = UreqTransport::new(params.timeout_secs);
    let frame = create_drivers_data(&params, &context, &transport, until_year)?;

    match matches.value_of("output") {
        Some(path) => write_parquet(&frame, path)?,
        None => {
            let seasons = rows_per_season(&frame)?;
            println!("{} drivers across {} seasons.", frame.num_rows(), seasons.len());
            for (season, count) in seasons {
                println!("{}: {}", season, count);
            }
        }
    }

    Ok(())
}

fn main() {
    let matches = command_usage().get_matches();

    let level = if matches.is_present("verbose") { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        process::exit(1);
    }
}

#[test]
fn test_apply_overrides() {
    let params = config::parse_parameters(
        "[catalog_info_drivers_api]\nmin_year = 1950\nbase_url = \"b\"\ntail_url = \"t\"\n[catalog_info_drivers_api.namespace]\nns = \"urn:x\"\n",
    )
    .unwrap();
    let matches = command_usage().get_matches_from(vec![
        "f1-data-acquisition", "params.toml", "--min-year", "2000", "--http-timeout", "60", "--on-malformed", "skip",
    ]);

    let params = apply_overrides(params, &matches).unwrap();
    assert_eq!(params.min_year, 2000);
    assert_eq!(params.timeout_secs, 60);
    assert_eq!(params.on_malformed, ExtractionPolicy::Skip);
}

#[test]
fn test_invalid_year_override() {
    let matches = command_usage().get_matches_from(vec!["f1-data-acquisition", "--current-year", "next"]);
    assert!(matches!(parse_number::<i32>(&matches, "current-year"), Err(Error::Config(_))));
}
