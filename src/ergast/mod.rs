pub mod drivers;
pub mod seasons;

pub const USER_AGENT: &str = "f1-data-acquisition/0.1";

/// One driver as listed for one season. The same `driver_id` recurs once per
/// season raced; `(driver_id, grid_year)` identifies a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRecord {
    pub driver_id: String,
    pub code: Option<String>,
    pub permanent_number: Option<String>, // absent for most historical drivers
    pub given_name: String,
    pub family_name: String,
    pub date_of_birth: String, // YYYY-MM-DD, kept as delivered
    pub nationality: String,
    pub grid_year: String, // season the record was scraped from, not the debut
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub year: i32,
    pub url: String,
}
