//! Fixtures shared by the unit tests: Ergast-shaped documents, a canned
//! transport and a logger that records what the current thread emitted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::{Error, Result};
use crate::transport::{HttpResponse, Transport};

pub const NAMESPACE: &str = "http://ergast.com/mrd/1.5";

pub struct DriverFixture {
    pub driver_id: &'static str,
    pub code: Option<&'static str>,
    pub permanent_number: Option<&'static str>,
    pub given_name: Option<&'static str>,
}

impl DriverFixture {
    pub fn new(driver_id: &'static str) -> DriverFixture {
        DriverFixture {
            driver_id,
            code: None,
            permanent_number: None,
            given_name: Some("Given"),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(r#"<Driver driverId="{}""#, self.driver_id);
        if let Some(code) = self.code {
            xml.push_str(&format!(r#" code="{}""#, code));
        }
        xml.push_str(&format!(r#" url="http://en.wikipedia.org/wiki/{}">"#, self.driver_id));

        if let Some(number) = self.permanent_number {
            xml.push_str(&format!("<PermanentNumber>{}</PermanentNumber>", number));
        }
        if let Some(name) = self.given_name {
            xml.push_str(&format!("<GivenName>{}</GivenName>", name));
        }
        xml.push_str("<FamilyName>Family</FamilyName>");
        xml.push_str("<DateOfBirth>1985-01-07</DateOfBirth>");
        xml.push_str("<Nationality>British</Nationality>");
        xml.push_str("</Driver>");
        xml
    }
}

pub fn season_document(season: i32, drivers: &[DriverFixture]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><MRData xmlns="{}" series="f1" limit="1000" offset="0" total="{}"><DriverTable season="{}">"#,
        NAMESPACE,
        drivers.len(),
        season
    );
    for driver in drivers {
        xml.push_str(&driver.to_xml());
    }
    xml.push_str("</DriverTable></MRData>");
    xml
}

/// Serves fixed responses by URL. Unknown URLs fail like a dropped connection.
#[derive(Default)]
pub struct CannedTransport {
    responses: HashMap<String, HttpResponse>,
    pub requested: RefCell<Vec<String>>,
}

impl CannedTransport {
    pub fn with(self, url: &str, status: u16, body: &str) -> CannedTransport {
        self.with_bytes(url, status, body.as_bytes().to_vec())
    }

    pub fn with_bytes(mut self, url: &str, status: u16, body: Vec<u8>) -> CannedTransport {
        self.responses.insert(url.to_owned(), HttpResponse { status, body });
        self
    }
}

impl Transport for CannedTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requested.borrow_mut().push(url.to_owned());
        match self.responses.get(url) {
            Some(response) => Ok(response.clone()),
            None => Err(Error::Transport {
                url: url.to_owned(),
                message: "connection refused".to_owned(),
            }),
        }
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|c| c.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Runs `f` and returns what it logged on this thread.
pub fn capture_logs<F: FnOnce() -> R, R>(f: F) -> (R, Vec<(Level, String)>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });

    CAPTURED.with(|c| c.borrow_mut().clear());
    let result = f();
    let logs = CAPTURED.with(|c| c.borrow_mut().drain(..).collect());
    (result, logs)
}

pub fn warnings(logs: &[(Level, String)]) -> Vec<&str> {
    logs.iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message.as_str())
        .collect()
}
