use log::{debug, warn};
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};

use super::DriverRecord;
use crate::config::ExtractionPolicy;
use crate::error::{Error, ExtractionError, Result};
use crate::transport::Transport;

const DRIVER_TAG: &str = "Driver";

/// The path segment before the last one, i.e. the `2020` of `.../2020/drivers`.
pub fn grid_year_from_url(url: &str) -> Option<&str> {
    lazy_static! {
        static ref RE_GRID_YEAR: Regex = Regex::new(r"(?:^|/)(?P<year>[^/]+)/[^/]*$").unwrap();
    }

    RE_GRID_YEAR.captures(url)
        .and_then(|x| x.name("year"))
        .map(|m| m.as_str())
}

fn find_child<'a, 'input>(driver: &Node<'a, 'input>, namespace: &str, tag: &str) -> Option<Node<'a, 'input>> {
    driver.children().find(|c| c.has_tag_name((namespace, tag)))
}

fn required_text(driver: &Node, namespace: &str, driver_id: &str, element: &'static str) -> std::result::Result<String, ExtractionError> {
    match find_child(driver, namespace, element) {
        Some(node) => Ok(node.text().unwrap_or("").to_owned()),
        None => Err(ExtractionError::MissingElement {
            driver_id: driver_id.to_owned(),
            element,
        }),
    }
}

fn extract_driver(driver: &Node, namespace: &str, grid_year: &str) -> std::result::Result<DriverRecord, ExtractionError> {
    let driver_id = match driver.attribute("driverId") {
        Some(id) => id,
        None => return Err(ExtractionError::MissingAttribute { attribute: "driverId" }),
    };

    // an empty <PermanentNumber/> counts as absent
    let permanent_number = find_child(driver, namespace, "PermanentNumber")
        .and_then(|n| n.text())
        .map(|t| t.to_owned());

    Ok(DriverRecord {
        driver_id: driver_id.to_owned(),
        code: driver.attribute("code").map(|c| c.to_owned()),
        permanent_number,
        given_name: required_text(driver, namespace, driver_id, "GivenName")?,
        family_name: required_text(driver, namespace, driver_id, "FamilyName")?,
        date_of_birth: required_text(driver, namespace, driver_id, "DateOfBirth")?,
        nationality: required_text(driver, namespace, driver_id, "Nationality")?,
        grid_year: grid_year.to_owned(),
    })
}

/// Every `Driver` element in `namespace`, at any depth, in document order.
/// An unparsable document is an error; a malformed entry is reported in place.
pub fn parse_drivers(xml: &str, namespace: &str, grid_year: &str) -> Result<Vec<std::result::Result<DriverRecord, ExtractionError>>> {
    // Ergast documents may carry a DOCTYPE; nothing in it is needed
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(xml, options)?;

    let drivers = document
        .descendants()
        .filter(|n| n.has_tag_name((namespace, DRIVER_TAG)))
        .map(|n| extract_driver(&n, namespace, grid_year))
        .collect();

    Ok(drivers)
}

/// Fetches one season document and turns it into records.
///
/// Anything short of a 200 response is logged and yields no records, so a bad
/// season leaves a gap instead of failing the run. Malformed entries are
/// handled according to `policy`.
pub fn fetch_and_parse_url<T: Transport + ?Sized>(transport: &T, url: &str, namespace: &str, policy: ExtractionPolicy) -> Result<Vec<DriverRecord>> {
    let grid_year = match grid_year_from_url(url) {
        Some(year) => year,
        None => {
            return Err(Error::Extraction {
                url: url.to_owned(),
                source: ExtractionError::MissingYearSegment { url: url.to_owned() },
            })
        }
    };

    debug!("Requesting {}", url);
    let response = match transport.get(url) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to get drivers data. {}", e);
            return Ok(Vec::new());
        }
    };

    if response.status != 200 {
        warn!("Failed to get drivers data. Status code: {}", response.status);
        return Ok(Vec::new());
    }

    let text = String::from_utf8(response.body).map_err(|source| Error::Encoding {
        url: url.to_owned(),
        source,
    })?;

    let mut records = Vec::new();
    for entry in parse_drivers(&text, namespace, grid_year)? {
        match entry {
            Ok(record) => records.push(record),
            Err(source) => match policy {
                ExtractionPolicy::Abort => {
                    return Err(Error::Extraction {
                        url: url.to_owned(),
                        source,
                    })
                }
                ExtractionPolicy::Skip => {
                    warn!("Skipping malformed driver entry from {}: {}", url, source);
                }
            },
        }
    }

    debug!("Parsed {} drivers for season {}", records.len(), grid_year);
    Ok(records)
}

#[cfg(test)]
use crate::testing::{capture_logs, season_document, warnings, CannedTransport, DriverFixture, NAMESPACE};

#[cfg(test)]
const URL_2020: &str = "http://ergast.com/api/f1/2020/drivers";

#[test]
fn test_grid_year_from_url() {
    assert_eq!(grid_year_from_url("http://ergast.com/api/f1/2020/drivers"), Some("2020"));
    assert_eq!(grid_year_from_url("http://ergast.com/api/f1/1950/drivers.xml"), Some("1950"));
    assert_eq!(grid_year_from_url("2020/drivers"), Some("2020"));
    assert_eq!(grid_year_from_url("drivers"), None);
}

#[test]
fn test_parse_drivers_fields() {
    let mut hamilton = DriverFixture::new("hamilton");
    hamilton.code = Some("HAM");
    hamilton.permanent_number = Some("44");
    hamilton.given_name = Some("Lewis");
    let farina = DriverFixture::new("farina");

    let xml = season_document(2020, &[hamilton, farina]);
    let parsed = parse_drivers(&xml, NAMESPACE, "2020").unwrap();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0], Ok(DriverRecord {
        driver_id: "hamilton".to_owned(),
        code: Some("HAM".to_owned()),
        permanent_number: Some("44".to_owned()),
        given_name: "Lewis".to_owned(),
        family_name: "Family".to_owned(),
        date_of_birth: "1985-01-07".to_owned(),
        nationality: "British".to_owned(),
        grid_year: "2020".to_owned(),
    }));

    let farina = parsed[1].as_ref().unwrap();
    assert_eq!(farina.code, None);
    assert_eq!(farina.permanent_number, None);
}

#[test]
fn test_parse_drivers_ignores_other_namespaces() {
    let xml = format!(
        r#"<MRData xmlns="{}" xmlns:x="urn:other"><DriverTable><x:Driver driverId="ghost"/>{}</DriverTable></MRData>"#,
        NAMESPACE,
        DriverFixture::new("alonso").to_xml()
    );
    let parsed = parse_drivers(&xml, NAMESPACE, "2005").unwrap();

    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].as_ref().unwrap().driver_id, "alonso");
}

#[test]
fn test_parse_drivers_missing_given_name() {
    let mut nameless = DriverFixture::new("nameless");
    nameless.given_name = None;
    let xml = season_document(1951, &[DriverFixture::new("fangio"), nameless]);

    let parsed = parse_drivers(&xml, NAMESPACE, "1951").unwrap();
    assert!(parsed[0].is_ok());
    assert_eq!(parsed[1], Err(ExtractionError::MissingElement {
        driver_id: "nameless".to_owned(),
        element: "GivenName",
    }));
}

#[test]
fn test_parse_drivers_with_doctype() {
    let xml = season_document(2020, &[DriverFixture::new("sainz"), DriverFixture::new("norris")])
        .replacen("<MRData", "<!DOCTYPE MRData><MRData", 1);

    let parsed = parse_drivers(&xml, NAMESPACE, "2020").unwrap();
    assert_eq!(parsed.len(), 2);
    assert!(parsed.iter().all(|r| r.is_ok()));
}

#[test]
fn test_parse_drivers_missing_driver_id() {
    let xml = format!(
        r#"<MRData xmlns="{}"><DriverTable><Driver code="X"><GivenName>A</GivenName><FamilyName>B</FamilyName><DateOfBirth>1900-01-01</DateOfBirth><Nationality>C</Nationality></Driver></DriverTable></MRData>"#,
        NAMESPACE
    );

    let parsed = parse_drivers(&xml, NAMESPACE, "1960").unwrap();
    assert_eq!(parsed, vec![Err(ExtractionError::MissingAttribute { attribute: "driverId" })]);
}

#[test]
fn test_parse_drivers_empty_required_element() {
    let mut blank = DriverFixture::new("blank");
    blank.given_name = Some("");
    let xml = season_document(1958, &[blank]).replace("<GivenName></GivenName>", "<GivenName/>");

    let parsed = parse_drivers(&xml, NAMESPACE, "1958").unwrap();
    assert_eq!(parsed[0].as_ref().unwrap().given_name, "");
}

#[test]
fn test_parse_drivers_invalid_xml() {
    assert!(matches!(parse_drivers("<MRData><Driver>", NAMESPACE, "2020"), Err(Error::Xml(_))));
}

#[test]
fn test_fetch_and_parse_counts_and_year() {
    let drivers: Vec<DriverFixture> = ["a", "b", "c"].iter().map(|id| DriverFixture::new(*id)).collect();
    // the body claims another season; grid_year must come from the URL
    let transport = CannedTransport::default().with(URL_2020, 200, &season_document(1999, &drivers));

    let records = fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort).unwrap();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.grid_year == "2020"));
    assert_eq!(transport.requested.borrow().as_slice(), &[URL_2020.to_owned()]);
}

#[test]
fn test_fetch_and_parse_error_status() {
    let transport = CannedTransport::default().with(URL_2020, 503, "unavailable");

    let (result, logs) = capture_logs(|| fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort));

    assert!(result.unwrap().is_empty());
    assert_eq!(warnings(&logs), vec!["Failed to get drivers data. Status code: 503"]);
}

#[test]
fn test_fetch_and_parse_transport_failure() {
    let transport = CannedTransport::default();

    let (result, logs) = capture_logs(|| fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort));

    assert!(result.unwrap().is_empty());
    assert_eq!(warnings(&logs).len(), 1);
}

#[test]
fn test_fetch_and_parse_missing_given_name_aborts_batch() {
    let mut nameless = DriverFixture::new("nameless");
    nameless.given_name = None;
    let body = season_document(2020, &[DriverFixture::new("first"), nameless]);
    let transport = CannedTransport::default().with(URL_2020, 200, &body);

    match fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort) {
        Err(Error::Extraction { url, source }) => {
            assert_eq!(url, URL_2020);
            assert_eq!(source, ExtractionError::MissingElement { driver_id: "nameless".to_owned(), element: "GivenName" });
        }
        other => panic!("expected an extraction error, got {:?}", other),
    }
}

#[test]
fn test_fetch_and_parse_missing_given_name_skipped() {
    let mut nameless = DriverFixture::new("nameless");
    nameless.given_name = None;
    let body = season_document(2020, &[DriverFixture::new("first"), nameless, DriverFixture::new("last")]);
    let transport = CannedTransport::default().with(URL_2020, 200, &body);

    let (result, logs) = capture_logs(|| fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Skip));

    let ids: Vec<String> = result.unwrap().into_iter().map(|r| r.driver_id).collect();
    assert_eq!(ids, vec!["first", "last"]);
    assert_eq!(warnings(&logs).len(), 1);
    assert!(warnings(&logs)[0].contains("GivenName"));
}

#[test]
fn test_fetch_and_parse_missing_driver_id() {
    let body = season_document(2020, &[DriverFixture::new("first")])
        .replace("</DriverTable>", "<Driver><GivenName>A</GivenName></Driver></DriverTable>");
    let transport = CannedTransport::default().with(URL_2020, 200, &body);

    match fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort) {
        Err(Error::Extraction { source, .. }) => assert_eq!(source, ExtractionError::MissingAttribute { attribute: "driverId" }),
        other => panic!("expected an extraction error, got {:?}", other),
    }

    let (result, logs) = capture_logs(|| fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Skip));

    let ids: Vec<String> = result.unwrap().into_iter().map(|r| r.driver_id).collect();
    assert_eq!(ids, vec!["first"]);
    assert_eq!(warnings(&logs).len(), 1);
    assert!(warnings(&logs)[0].contains("driverId"));
}

#[test]
fn test_fetch_and_parse_rejects_non_utf8() {
    let transport = CannedTransport::default().with_bytes(URL_2020, 200, vec![0x3c, 0xff, 0xfe]);

    assert!(matches!(
        fetch_and_parse_url(&transport, URL_2020, NAMESPACE, ExtractionPolicy::Abort),
        Err(Error::Encoding { .. })
    ));
}
