use arrow::record_batch::RecordBatch;
use log::{debug, info};

use crate::config::DriverApiParameters;
use crate::ergast::drivers::fetch_and_parse_url;
use crate::ergast::seasons::request_targets;
use crate::frame::FrameContext;
use crate::error::Result;
use crate::transport::Transport;

// How the first-load pipeline knows this node.
pub const NODE_NAME: &str = "create_drivers_data_table";
pub const NODE_INPUT: &str = "params:catalog_info_drivers_api";
pub const NODE_OUTPUT: &str = "drivers_data";
pub const NODE_TAGS: [&str; 2] = ["first_load", "ergast_f1"];

/// Pulls every completed season from `min_year` up to `current_year` and
/// returns one frame of drivers, seasons in ascending order.
///
/// Seasons are fetched one after another. A season whose request fails is
/// missing from the output; a malformed driver entry follows the configured
/// policy. No seasons at all gives an empty frame, not an error.
pub fn create_drivers_data<T: Transport + ?Sized>(params: &DriverApiParameters, context: &FrameContext, transport: &T, current_year: i32) -> Result<RecordBatch> {
    let namespace = params.namespace_uri()?;
    let targets = request_targets(&params.base_url, &params.tail_url, params.min_year, current_year);

    info!("[{}] Requesting {} seasons from {} up to {}", context.name(), targets.len(), params.min_year, current_year);

    let mut all_drivers = Vec::new();
    for target in &targets {
        debug!("[{}] Season {}", context.name(), target.year);
        all_drivers.extend(fetch_and_parse_url(transport, &target.url, namespace, params.on_malformed)?);
    }

    info!("[{}] Collected {} driver rows", context.name(), all_drivers.len());
    context.create_frame(&all_drivers)
}

#[cfg(test)]
use crate::config::{parse_parameters, ExtractionPolicy};
#[cfg(test)]
use crate::error::Error;
#[cfg(test)]
use crate::frame::rows_per_season;
#[cfg(test)]
use crate::testing::{capture_logs, season_document, warnings, CannedTransport, DriverFixture, NAMESPACE};
#[cfg(test)]
use arrow::array::{Array, StringArray};

#[cfg(test)]
fn parameters(min_year: i32) -> DriverApiParameters {
    parse_parameters(&format!(
        "[catalog_info_drivers_api]\nmin_year = {}\nbase_url = \"http://ergast.com/api/f1\"\ntail_url = \"drivers\"\n[catalog_info_drivers_api.namespace]\nns = \"{}\"\n",
        min_year, NAMESPACE
    ))
    .unwrap()
}

#[cfg(test)]
fn season_url(year: i32) -> String {
    format!("http://ergast.com/api/f1/{}/drivers", year)
}

#[cfg(test)]
fn string_column(frame: &RecordBatch, name: &str) -> Vec<String> {
    let column = frame.column_by_name(name).unwrap().as_any().downcast_ref::<StringArray>().unwrap();
    (0..column.len()).map(|i| column.value(i).to_owned()).collect()
}

#[test]
fn test_create_drivers_data_two_seasons() {
    let transport = CannedTransport::default()
        .with(&season_url(2020), 200, &season_document(2020, &[DriverFixture::new("hamilton"), DriverFixture::new("bottas")]))
        .with(&season_url(2021), 200, &season_document(2021, &[DriverFixture::new("verstappen"), DriverFixture::new("hamilton")]));

    let frame = create_drivers_data(&parameters(2020), &FrameContext::new("test"), &transport, 2022).unwrap();

    assert_eq!(frame.num_rows(), 4);
    assert_eq!(string_column(&frame, "grid_year"), vec!["2020", "2020", "2021", "2021"]);
    assert_eq!(string_column(&frame, "driver_id"), vec!["hamilton", "bottas", "verstappen", "hamilton"]);
    // the season in progress is never requested
    assert_eq!(*transport.requested.borrow(), vec![season_url(2020), season_url(2021)]);
}

#[test]
fn test_create_drivers_data_all_failed() {
    let transport = CannedTransport::default()
        .with(&season_url(2019), 500, "")
        .with(&season_url(2020), 500, "")
        .with(&season_url(2021), 500, "");

    let (result, logs) = capture_logs(|| create_drivers_data(&parameters(2019), &FrameContext::new("test"), &transport, 2022));

    let frame = result.unwrap();
    assert_eq!(frame.num_rows(), 0);
    assert_eq!(frame.num_columns(), 8);
    assert_eq!(warnings(&logs), vec!["Failed to get drivers data. Status code: 500"; 3]);
}

#[test]
fn test_create_drivers_data_missing_season_leaves_gap() {
    let transport = CannedTransport::default()
        .with(&season_url(2019), 200, &season_document(2019, &[DriverFixture::new("kubica")]))
        .with(&season_url(2020), 404, "")
        .with(&season_url(2021), 200, &season_document(2021, &[DriverFixture::new("kubica")]));

    let frame = create_drivers_data(&parameters(2019), &FrameContext::new("test"), &transport, 2022).unwrap();

    let counts = rows_per_season(&frame).unwrap();
    assert_eq!(counts.keys().cloned().collect::<Vec<_>>(), vec!["2019", "2021"]);
}

#[test]
fn test_create_drivers_data_empty_range() {
    let transport = CannedTransport::default();

    let frame = create_drivers_data(&parameters(2022), &FrameContext::new("test"), &transport, 2022).unwrap();

    assert_eq!(frame.num_rows(), 0);
    assert!(transport.requested.borrow().is_empty());
}

#[test]
fn test_create_drivers_data_malformed_entry() {
    let mut nameless = DriverFixture::new("nameless");
    nameless.given_name = None;
    let body = season_document(2021, &[DriverFixture::new("russell"), nameless]);
    let transport = CannedTransport::default()
        .with(&season_url(2020), 200, &season_document(2020, &[DriverFixture::new("russell")]))
        .with(&season_url(2021), 200, &body);

    let mut params = parameters(2020);
    let aborted = create_drivers_data(&params, &FrameContext::new("test"), &transport, 2022);
    assert!(matches!(aborted, Err(Error::Extraction { .. })));

    params.on_malformed = ExtractionPolicy::Skip;
    let frame = create_drivers_data(&params, &FrameContext::new("test"), &transport, 2022).unwrap();
    assert_eq!(string_column(&frame, "driver_id"), vec!["russell", "russell"]);
}
