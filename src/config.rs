use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Prefix the driver lookups are resolved against, as in `ns:Driver`.
pub const NAMESPACE_PREFIX: &str = "ns";

/// Ergast can be very slow for older seasons, so the timeout is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1000;

/// What to do with a `Driver` entry that is missing a required field.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPolicy {
    /// The whole run fails on the first malformed entry.
    Abort,
    /// The entry is logged and left out; the rest of the season is kept.
    Skip,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        ExtractionPolicy::Abort
    }
}

impl FromStr for ExtractionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_ref() {
            "abort" => Ok(ExtractionPolicy::Abort),
            "skip" => Ok(ExtractionPolicy::Skip),
            q => Err(Error::Config(format!("Unknown malformed-record policy: '{}'. Expected 'abort' or 'skip'.", q))),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize, Debug, Clone)]
pub struct DriverApiParameters {
    pub min_year: i32,                      // first season fetched
    pub base_url: String,                   // e.g. http://ergast.com/api/f1
    pub tail_url: String,                   // e.g. drivers
    pub namespace: HashMap<String, String>, // prefix -> namespace URI
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub on_malformed: ExtractionPolicy,
}

/// The parameters file; other nodes may keep their own tables alongside ours.
#[derive(Deserialize, Debug)]
struct ParametersFile {
    catalog_info_drivers_api: DriverApiParameters,
}

impl DriverApiParameters {
    /// URI the `Driver` lookups are qualified with.
    pub fn namespace_uri(&self) -> Result<&str> {
        match self.namespace.get(NAMESPACE_PREFIX) {
            Some(uri) if !uri.trim().is_empty() => Ok(uri.trim()),
            Some(_) => Err(Error::Config(format!("Namespace prefix '{}' maps to an empty URI.", NAMESPACE_PREFIX))),
            None => Err(Error::Config(format!("Namespace mapping must contain the prefix '{}'.", NAMESPACE_PREFIX))),
        }
    }

    fn validate(mut self) -> Result<Self> {
        self.namespace_uri()?;

        self.base_url = self.base_url.trim().trim_end_matches('/').to_owned();
        self.tail_url = self.tail_url.trim().trim_start_matches('/').to_owned();

        if self.base_url.is_empty() {
            return Err(Error::Config("base_url must not be empty.".to_owned()));
        }
        if self.tail_url.is_empty() {
            return Err(Error::Config("tail_url must not be empty.".to_owned()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than zero.".to_owned()));
        }

        Ok(self)
    }
}

pub fn parse_parameters(text: &str) -> Result<DriverApiParameters> {
    let file: ParametersFile = toml::from_str(text)?;
    file.catalog_info_drivers_api.validate()
}

pub fn load_parameters<P: AsRef<Path>>(path: P) -> Result<DriverApiParameters> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read parameters from {}: {}", path.display(), e)))?;

    parse_parameters(&text)
}

#[cfg(test)]
const SAMPLE: &str = r#"
[catalog_info_drivers_api]
min_year = 1950
base_url = "http://ergast.com/api/f1/"
tail_url = "/drivers"

[catalog_info_drivers_api.namespace]
ns = "http://ergast.com/mrd/1.5"
"#;

#[test]
fn test_parse_parameters_defaults() {
    let params = parse_parameters(SAMPLE).unwrap();

    assert_eq!(params.min_year, 1950);
    assert_eq!(params.base_url, "http://ergast.com/api/f1");
    assert_eq!(params.tail_url, "drivers");
    assert_eq!(params.namespace_uri().unwrap(), "http://ergast.com/mrd/1.5");
    assert_eq!(params.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(params.on_malformed, ExtractionPolicy::Abort);
}

#[test]
fn test_parse_parameters_optional_keys() {
    let text = SAMPLE.replace("tail_url = \"/drivers\"", "tail_url = \"drivers\"\ntimeout_secs = 30\non_malformed = \"skip\"");
    let params = parse_parameters(&text).unwrap();

    assert_eq!(params.timeout_secs, 30);
    assert_eq!(params.on_malformed, ExtractionPolicy::Skip);
}

#[test]
fn test_missing_key_is_fatal() {
    let text = SAMPLE.replace("min_year = 1950\n", "");
    match parse_parameters(&text) {
        Err(Error::ConfigParse(e)) => assert!(e.to_string().contains("min_year")),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_missing_namespace_prefix_is_fatal() {
    let text = SAMPLE.replace("ns = ", "mrd = ");
    assert!(matches!(parse_parameters(&text), Err(Error::Config(_))));
}

#[test]
fn test_policy_from_str() {
    assert_eq!("SKIP".parse::<ExtractionPolicy>().unwrap(), ExtractionPolicy::Skip);
    assert_eq!("abort".parse::<ExtractionPolicy>().unwrap(), ExtractionPolicy::Abort);
    assert!("retry".parse::<ExtractionPolicy>().is_err());
}

#[test]
fn test_load_parameters_missing_file() {
    assert!(matches!(load_parameters("does/not/exist.toml"), Err(Error::Config(_))));
}
