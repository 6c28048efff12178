use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::canonical;
use crate::models::{
    Counts, EnrolmentCounts, EnrolmentRecord, Record, Source, SourceHealth, UpdateCounts,
    UpdateRecord,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} is missing columns: {}", path.display(), missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
}

/// The three cleaned source datasets.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub enrolment: Vec<EnrolmentRecord>,
    pub biometric: Vec<UpdateRecord>,
    pub demographic: Vec<UpdateRecord>,
}

/// A count cell. Unparseable, missing and non-finite values read as 0.
fn cell(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

trait RawRow: DeserializeOwned {
    type Counts: Counts;
    const COUNT_COLUMNS: &'static [&'static str];

    fn into_parts(self) -> (String, Option<String>, String, Self::Counts);
}

#[derive(Debug, Deserialize)]
struct RawEnrolmentRow {
    state: String,
    #[serde(default)]
    district: Option<String>,
    date: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    age_0_5: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    age_5_17: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    age_18_greater: Option<f64>,
}

impl RawRow for RawEnrolmentRow {
    type Counts = EnrolmentCounts;
    const COUNT_COLUMNS: &'static [&'static str] = &["age_0_5", "age_5_17", "age_18_greater"];

    fn into_parts(self) -> (String, Option<String>, String, EnrolmentCounts) {
        let counts = EnrolmentCounts {
            age_0_5: cell(self.age_0_5),
            age_5_17: cell(self.age_5_17),
            age_18_plus: cell(self.age_18_greater),
        };
        (self.state, self.district, self.date, counts)
    }
}

#[derive(Debug, Deserialize)]
struct RawBiometricRow {
    state: String,
    #[serde(default)]
    district: Option<String>,
    date: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bio_age_5_17: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bio_age_17_: Option<f64>,
}

impl RawRow for RawBiometricRow {
    type Counts = UpdateCounts;
    const COUNT_COLUMNS: &'static [&'static str] = &["bio_age_5_17", "bio_age_17_"];

    fn into_parts(self) -> (String, Option<String>, String, UpdateCounts) {
        let counts = UpdateCounts {
            age_5_17: cell(self.bio_age_5_17),
            age_17_plus: cell(self.bio_age_17_),
        };
        (self.state, self.district, self.date, counts)
    }
}

#[derive(Debug, Deserialize)]
struct RawDemographicRow {
    state: String,
    #[serde(default)]
    district: Option<String>,
    date: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    demo_age_5_17: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    demo_age_17_: Option<f64>,
}

impl RawRow for RawDemographicRow {
    type Counts = UpdateCounts;
    const COUNT_COLUMNS: &'static [&'static str] = &["demo_age_5_17", "demo_age_17_"];

    fn into_parts(self) -> (String, Option<String>, String, UpdateCounts) {
        let counts = UpdateCounts {
            age_5_17: cell(self.demo_age_5_17),
            age_17_plus: cell(self.demo_age_17_),
        };
        (self.state, self.district, self.date, counts)
    }
}

const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a day-first date, returning `None` for anything unrecognised.
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LoadError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// All CSV files for `folder`: those inside `<base>/<folder>/` plus flat
/// `<base>/<folder>*.csv` exports. Sorted, without duplicates.
pub fn discover_files(base: &Path, folder: &str) -> Result<Vec<PathBuf>, LoadError> {
    let mut files: Vec<PathBuf> = list_dir(&base.join(folder))?
        .into_iter()
        .filter(|path| is_csv(path))
        .collect();

    files.extend(list_dir(base)?.into_iter().filter(|path| {
        is_csv(path)
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(folder))
    }));

    files.sort();
    files.dedup();
    Ok(files)
}

fn clean_row<R: RawRow>(raw: R) -> Option<Record<R::Counts>> {
    let (state, district, date, counts) = raw.into_parts();
    let region = canonical::region_name(&state);
    if !canonical::is_recognised(&region) {
        return None;
    }
    let date = parse_day_first(&date)?;
    let subregion = district
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Some(Record {
        region,
        subregion,
        date,
        counts,
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct ReadStats {
    rows: usize,
    dropped: usize,
}

fn read_file<R: RawRow>(
    path: &Path,
    records: &mut Vec<Record<R::Counts>>,
    stats: &mut ReadStats,
) -> Result<(), LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let missing: Vec<String> = ["state", "date"]
        .iter()
        .chain(R::COUNT_COLUMNS)
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let before = records.len();
    for result in reader.deserialize::<R>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(err) if err.is_io_error() => return Err(csv_err(err)),
            Err(_) => {
                stats.dropped += 1;
                continue;
            }
        };
        match clean_row(raw) {
            Some(record) => records.push(record),
            None => stats.dropped += 1,
        }
    }
    stats.rows += records.len() - before;
    debug!(path = %path.display(), rows = records.len() - before, "read source file");
    Ok(())
}

fn read_source<R: RawRow>(source: Source, base: &Path) -> (Vec<Record<R::Counts>>, SourceHealth) {
    let files = match discover_files(base, source.folder()) {
        Ok(files) => files,
        Err(err) => {
            warn!(%source, error = %err, "source discovery failed");
            return (Vec::new(), SourceHealth::Error { message: err.to_string() });
        }
    };
    if files.is_empty() {
        info!(%source, "no files found");
        return (Vec::new(), SourceHealth::NoData);
    }

    let mut records = Vec::new();
    let mut stats = ReadStats::default();
    for path in &files {
        if let Err(err) = read_file::<R>(path, &mut records, &mut stats) {
            warn!(%source, error = %err, "source load failed");
            return (Vec::new(), SourceHealth::Error { message: err.to_string() });
        }
    }

    info!(
        %source,
        files = files.len(),
        rows = stats.rows,
        rows_dropped = stats.dropped,
        "source loaded"
    );
    let health = SourceHealth::Active {
        files: files.len(),
        rows: stats.rows,
        rows_dropped: stats.dropped,
    };
    (records, health)
}

/// Load every source under `base`. Failures stay inside their source's
/// health entry; this never fails as a whole.
pub fn load_all(base: &Path) -> (Datasets, BTreeMap<Source, SourceHealth>) {
    let mut health = BTreeMap::new();

    let (enrolment, h) = read_source::<RawEnrolmentRow>(Source::Enrolment, base);
    health.insert(Source::Enrolment, h);
    let (biometric, h) = read_source::<RawBiometricRow>(Source::Biometric, base);
    health.insert(Source::Biometric, h);
    let (demographic, h) = read_source::<RawDemographicRow>(Source::Demographic, base);
    health.insert(Source::Demographic, h);

    let datasets = Datasets {
        enrolment,
        biometric,
        demographic,
    };
    (datasets, health)
}
