use std::fmt;
use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Enrolment,
    Biometric,
    Demographic,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Enrolment, Source::Biometric, Source::Demographic];

    pub fn folder(self) -> &'static str {
        match self {
            Source::Enrolment => "api_data_aadhar_enrolment",
            Source::Biometric => "api_data_aadhar_biometric",
            Source::Demographic => "api_data_aadhar_demographic",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Enrolment => "enrolment",
            Source::Biometric => "biometric",
            Source::Demographic => "demographic",
        })
    }
}

/// Summable per-row activity counts of one source.
pub trait Counts: Copy + Default + AddAssign {
    fn total(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolmentCounts {
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_plus: f64,
}

impl AddAssign for EnrolmentCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.age_0_5 += rhs.age_0_5;
        self.age_5_17 += rhs.age_5_17;
        self.age_18_plus += rhs.age_18_plus;
    }
}

impl Counts for EnrolmentCounts {
    fn total(&self) -> f64 {
        self.age_0_5 + self.age_5_17 + self.age_18_plus
    }
}

/// Minor/adult split shared by the biometric and demographic update feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounts {
    pub age_5_17: f64,
    pub age_17_plus: f64,
}

impl AddAssign for UpdateCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.age_5_17 += rhs.age_5_17;
        self.age_17_plus += rhs.age_17_plus;
    }
}

impl Counts for UpdateCounts {
    fn total(&self) -> f64 {
        self.age_5_17 + self.age_17_plus
    }
}

/// A cleaned row: canonical region, optional sub-region, parsed date.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<C> {
    pub region: String,
    pub subregion: Option<String>,
    pub date: NaiveDate,
    pub counts: C,
}

pub type EnrolmentRecord = Record<EnrolmentCounts>;
pub type UpdateRecord = Record<UpdateCounts>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceHealth {
    Active {
        files: usize,
        rows: usize,
        rows_dropped: usize,
    },
    NoData,
    Error {
        message: String,
    },
}

impl fmt::Display for SourceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceHealth::Active { files, .. } => write!(f, "active ({files} files)"),
            SourceHealth::NoData => f.write_str("no data"),
            SourceHealth::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Closed date interval, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Critical,
    Medium,
    Low,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Critical, Tier::Medium, Tier::Low];

    pub fn classify(iri: f64) -> Tier {
        if iri >= 6.0 {
            Tier::Critical
        } else if iri >= 3.0 {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Tier::Critical => "#ff6b6b",
            Tier::Medium => "#ffd93d",
            Tier::Low => "#51cf66",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Critical => "CRITICAL",
            Tier::Medium => "MEDIUM",
            Tier::Low => "LOW",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskRecord {
    pub region: String,
    #[serde(rename = "IER")]
    pub ier: f64,
    #[serde(rename = "BCR")]
    pub bcr: f64,
    #[serde(rename = "DV")]
    pub dv: f64,
    #[serde(rename = "IRI")]
    pub iri: f64,
    pub tier: Tier,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_activity: u64,
    pub adult_share_pct: f64,
    pub regions_signal: f64,
    pub average_growth: f64,
    pub regions_covered: usize,
    pub window: Option<Window>,
    pub last_refreshed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub date: NaiveDate,
    pub adult_share_pct: f64,
    pub total_activity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub id: String,
    pub region: String,
    pub name: String,
    pub migration_proxy: f64,
    pub growth_pct: f64,
    pub total_activity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPoint {
    pub region: String,
    pub growth_pct: f64,
    pub total_activity: u64,
    pub migration_proxy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparisons {
    pub regions: Vec<RankingRow>,
    pub scatter: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPoint {
    pub date: NaiveDate,
    pub enrolment: EnrolmentCounts,
    pub biometric: UpdateCounts,
    pub demographic: UpdateCounts,
}
