use chrono::{Datelike, Local};

use super::RequestTarget;

pub fn current_year() -> i32 {
    Local::now().year()
}

/// One target per completed season in `[min_year, current_year)`. The season in
/// progress is never requested; an empty range is not an error.
pub fn request_targets(base_url: &str, tail_url: &str, min_year: i32, current_year: i32) -> Vec<RequestTarget> {
    (min_year..current_year)
        .map(|year| RequestTarget {
            year,
            url: format!("{base_url}/{year}/{tail_url}", base_url=base_url, year=year, tail_url=tail_url),
        })
        .collect()
}

#[test]
fn test_request_targets_shape() {
    let targets = request_targets("http://ergast.com/api/f1", "drivers", 2019, 2022);

    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0], RequestTarget { year: 2019, url: "http://ergast.com/api/f1/2019/drivers".to_owned() });
    assert_eq!(targets[2].url, "http://ergast.com/api/f1/2021/drivers");
    assert!(targets.windows(2).all(|w| w[0].year < w[1].year));
}

#[test]
fn test_request_targets_count() {
    for min_year in 1950..2022 {
        let targets = request_targets("b", "t", min_year, 2022);
        assert_eq!(targets.len() as i32, 2022 - min_year);
        for target in &targets {
            assert_eq!(target.url, format!("b/{}/t", target.year));
        }
    }
}

#[test]
fn test_request_targets_empty_range() {
    assert!(request_targets("b", "t", 2022, 2022).is_empty());
    assert!(request_targets("b", "t", 2030, 2022).is_empty());
}

#[test]
fn test_current_year_is_plausible() {
    assert!(current_year() >= 2024);
}
