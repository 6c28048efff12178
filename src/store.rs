use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::loader::{self, Datasets};
use crate::models::{Source, SourceHealth};

/// Canonical region -> sorted sub-regions, from enrolment rows only.
pub type RegionIndex = BTreeMap<String, BTreeSet<String>>;

/// One consistent generation of everything the loader produced.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub datasets: Datasets,
    pub health: BTreeMap<Source, SourceHealth>,
    pub regions: RegionIndex,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn build(datasets: Datasets, health: BTreeMap<Source, SourceHealth>) -> Self {
        let mut regions = RegionIndex::new();
        for record in &datasets.enrolment {
            let subregions = regions.entry(record.region.clone()).or_default();
            if let Some(sub) = &record.subregion {
                subregions.insert(sub.clone());
            }
        }

        let (min_date, max_date) = date_bounds(&datasets);
        Self {
            id: Uuid::new_v4(),
            datasets,
            health,
            regions,
            min_date,
            max_date,
            loaded_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self::build(Datasets::default(), BTreeMap::new())
    }

    /// The offline "now": the newest observed date.
    pub fn anchor(&self) -> Option<NaiveDate> {
        self.max_date
    }
}

/// Enrolment bounds when enrolment has rows, otherwise bounds over the
/// update feeds.
fn date_bounds(datasets: &Datasets) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let enrolment = datasets.enrolment.iter().map(|r| r.date);
    let min = enrolment.clone().min();
    if min.is_some() {
        return (min, enrolment.max());
    }
    let updates = datasets
        .biometric
        .iter()
        .chain(&datasets.demographic)
        .map(|r| r.date);
    (updates.clone().min(), updates.max())
}

/// Owns the current snapshot. Reload builds a whole new snapshot before
/// swapping it in, so readers see either the old or the new one.
#[derive(Debug)]
pub struct Store {
    data_dir: PathBuf,
    current: RwLock<Arc<Snapshot>>,
}

impl Store {
    pub fn load(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let snapshot = Self::read(&data_dir);
        Self {
            data_dir,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    fn read(data_dir: &Path) -> Snapshot {
        let (datasets, health) = loader::load_all(data_dir);
        let snapshot = Snapshot::build(datasets, health);
        info!(
            snapshot = %snapshot.id,
            regions = snapshot.regions.len(),
            enrolment_rows = snapshot.datasets.enrolment.len(),
            biometric_rows = snapshot.datasets.biometric.len(),
            demographic_rows = snapshot.datasets.demographic.len(),
            "datasets loaded"
        );
        snapshot
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn reload(&self) -> Arc<Snapshot> {
        let fresh = Arc::new(Self::read(&self.data_dir));
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&fresh);
        fresh
    }
}
