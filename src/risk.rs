use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::aggregate::{self, ratio, round2};
use crate::canonical;
use crate::loader::Datasets;
use crate::models::{Counts, RiskRecord, Tier};

const IER_FLOOR: f64 = 0.01;

const BUILTIN_BIRTH_PROXY: &[(&str, f64)] = &[
    ("Uttar Pradesh", 4_500_000.0),
    ("Bihar", 3_200_000.0),
    ("Maharashtra", 1_800_000.0),
    ("West Bengal", 1_400_000.0),
    ("Rajasthan", 1_600_000.0),
    ("Delhi", 350_000.0),
    ("Tamil Nadu", 900_000.0),
    ("Gujarat", 1_100_000.0),
    ("Karnataka", 1_000_000.0),
    ("Odisha", 700_000.0),
    ("Andhra Pradesh", 800_000.0),
    ("Telangana", 600_000.0),
    ("Kerala", 450_000.0),
    ("Madhya Pradesh", 1_500_000.0),
    ("Haryana", 550_000.0),
];

/// Annual births per region, the denominator of the expansion ratio.
#[derive(Debug, Clone)]
pub struct BirthProxyTable {
    entries: HashMap<String, f64>,
    fallback: f64,
}

impl BirthProxyTable {
    pub const DEFAULT_FALLBACK: f64 = 500_000.0;

    pub fn new<I, S>(entries: I, fallback: f64) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(region, births)| (canonical::region_name(region.as_ref()), births))
            .collect();
        Self { entries, fallback }
    }

    pub fn proxy_for(&self, region: &str) -> f64 {
        self.entries.get(region).copied().unwrap_or(self.fallback)
    }
}

impl Default for BirthProxyTable {
    fn default() -> Self {
        Self::new(BUILTIN_BIRTH_PROXY.iter().copied(), Self::DEFAULT_FALLBACK)
    }
}

/// Whole-dataset activity totals for one region.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionActivity {
    pub enrolment: f64,
    pub biometric: f64,
    pub demographic: f64,
}

pub fn composite(ier: f64, bcr: f64, dv: f64) -> f64 {
    ier * 0.4 + bcr * 0.3 + dv * 0.3
}

pub fn score_region(region: &str, activity: RegionActivity, birth_proxy: f64) -> RiskRecord {
    let ier = (ratio(activity.enrolment, birth_proxy) * 10.0).max(IER_FLOOR);
    let base = activity.enrolment.max(1.0);
    let bcr = activity.biometric / base * 5.0;
    let dv = activity.demographic / base * 5.0;
    let iri = composite(ier, bcr, dv);
    let tier = Tier::classify(iri);

    RiskRecord {
        region: region.to_string(),
        ier: round2(ier),
        bcr: round2(bcr),
        dv: round2(dv),
        iri: round2(iri),
        tier,
        color: tier.color(),
    }
}

/// One record per enrolment region, highest IRI first. Ties keep region
/// order.
pub fn score_regions(datasets: &Datasets, table: &BirthProxyTable) -> Vec<RiskRecord> {
    let enrolment: Vec<_> = datasets.enrolment.iter().collect();
    let biometric: Vec<_> = datasets.biometric.iter().collect();
    let demographic: Vec<_> = datasets.demographic.iter().collect();

    let enrol_totals = aggregate::sum_by_region(&enrolment);
    let bio_totals = aggregate::sum_by_region(&biometric);
    let demo_totals = aggregate::sum_by_region(&demographic);

    let mut scores: Vec<RiskRecord> = enrol_totals
        .iter()
        .map(|(region, counts)| {
            let activity = RegionActivity {
                enrolment: counts.total(),
                biometric: bio_totals.get(region).map_or(0.0, |c| c.total()),
                demographic: demo_totals.get(region).map_or(0.0, |c| c.total()),
            };
            score_region(region, activity, table.proxy_for(region))
        })
        .collect();

    scores.sort_by(|a, b| b.iri.partial_cmp(&a.iri).unwrap_or(std::cmp::Ordering::Equal));
    scores
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatus {
    Critical,
    Medium,
    Stable,
}

impl SystemStatus {
    pub fn from_mean_iri(mean: f64) -> Self {
        match Tier::classify(mean) {
            Tier::Critical => SystemStatus::Critical,
            Tier::Medium => SystemStatus::Medium,
            Tier::Low => SystemStatus::Stable,
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SystemStatus::Critical => "CRITICAL",
            SystemStatus::Medium => "MEDIUM",
            SystemStatus::Stable => "STABLE",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCount {
    pub tier: Tier,
    pub color: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskOverview {
    pub status: SystemStatus,
    pub mean_iri: f64,
    pub critical_regions: usize,
    pub distribution: Vec<TierCount>,
    pub regions: Vec<RiskRecord>,
}

pub fn overview(records: Vec<RiskRecord>) -> RiskOverview {
    let mean_iri = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.iri).sum::<f64>() / records.len() as f64
    };
    let distribution: Vec<TierCount> = Tier::ALL
        .into_iter()
        .map(|tier| TierCount {
            tier,
            color: tier.color(),
            count: records.iter().filter(|r| r.tier == tier).count(),
        })
        .collect();
    let critical_regions = distribution
        .iter()
        .find(|c| c.tier == Tier::Critical)
        .map_or(0, |c| c.count);

    RiskOverview {
        status: SystemStatus::from_mean_iri(mean_iri),
        mean_iri: round2(mean_iri),
        critical_regions,
        distribution,
        regions: records,
    }
}
