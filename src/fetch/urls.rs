// src/fetch/urls.rs
use std::collections::BTreeMap;

// One archive per year. Each ZIP holds either a set of monthly CSVs or, for
// the later years, a single Events<year>.csv covering the whole year.
static YEAR_ARCHIVE_URLS: &[(&str, &str)] = &[
    ("2013", "https://gisfiles.mbtadata.com/events/Events2013.zip"),
    ("2014", "https://gisfiles.mbtadata.com/events/Events2014.zip"),
    ("2015", "https://gisfiles.mbtadata.com/events/Events2015.zip"),
    ("2016", "https://gisfiles.mbtadata.com/events/Events2016.zip"),
    ("2017", "https://gisfiles.mbtadata.com/events/Events2017.zip"),
    ("2018", "https://gisfiles.mbtadata.com/events/Events2018.zip"),
    ("2019", "https://gisfiles.mbtadata.com/events/Events2019.zip"),
    ("2020", "https://gisfiles.mbtadata.com/events/Events2020.zip"),
];

/// The built-in year → archive URL table, in year order.
pub fn default_year_urls() -> BTreeMap<String, String> {
    YEAR_ARCHIVE_URLS
        .iter()
        .map(|(year, url)| (year.to_string(), url.to_string()))
        .collect()
}
