use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{Counts, EnrolmentCounts, Record, Window};

/// Optional region / sub-region filter, AND-ed when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub region: Option<String>,
    pub subregion: Option<String>,
}

impl Scope {
    pub fn matches<C>(&self, record: &Record<C>) -> bool {
        let region_ok = self
            .region
            .as_deref()
            .map_or(true, |region| record.region == region);
        let subregion_ok = self
            .subregion
            .as_deref()
            .map_or(true, |sub| record.subregion.as_deref() == Some(sub));
        region_ok && subregion_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// Last day of the calendar period containing `date`.
    pub fn bucket_end(self, date: NaiveDate) -> NaiveDate {
        let (year, last_month) = match self {
            Granularity::Monthly => (date.year(), date.month()),
            Granularity::Quarterly => (date.year(), ((date.month() - 1) / 3 + 1) * 3),
            Granularity::Yearly => (date.year(), 12),
        };
        month_end(year, last_month)
    }

    /// Every bucket end from the bucket holding `window.start` through the
    /// one holding `window.end`.
    pub fn buckets(self, window: &Window) -> Vec<NaiveDate> {
        let last = self.bucket_end(window.end);
        let mut current = self.bucket_end(window.start);
        let mut out = Vec::new();
        while current <= last {
            out.push(current);
            current = self.bucket_end(current + Duration::days(1));
        }
        out
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

pub fn filter<'a, C>(records: &'a [Record<C>], scope: &Scope, window: &Window) -> Vec<&'a Record<C>> {
    records
        .iter()
        .filter(|record| window.contains(record.date) && scope.matches(record))
        .collect()
}

pub fn total<C: Counts>(records: &[&Record<C>]) -> C {
    let mut sum = C::default();
    for record in records {
        sum += record.counts;
    }
    sum
}

/// Sum counts per key; rows whose key is `None` are skipped and keys with
/// no rows are absent.
pub fn sum_by<C, K, F>(records: &[&Record<C>], key: F) -> BTreeMap<K, C>
where
    C: Counts,
    K: Ord,
    F: Fn(&Record<C>) -> Option<K>,
{
    let mut groups: BTreeMap<K, C> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(*record) {
            *groups.entry(k).or_default() += record.counts;
        }
    }
    groups
}

/// Partition rows by key, keeping row order inside each group.
pub fn group_by<'a, C, K, F>(records: &[&'a Record<C>], key: F) -> BTreeMap<K, Vec<&'a Record<C>>>
where
    K: Ord,
    F: Fn(&Record<C>) -> Option<K>,
{
    let mut groups: BTreeMap<K, Vec<&'a Record<C>>> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(*record) {
            groups.entry(k).or_default().push(*record);
        }
    }
    groups
}

pub fn sum_by_region<C: Counts>(records: &[&Record<C>]) -> BTreeMap<String, C> {
    sum_by(records, |r| Some(r.region.clone()))
}

pub fn sum_by_subregion<C: Counts>(records: &[&Record<C>]) -> BTreeMap<(String, String), C> {
    sum_by(records, |r| {
        r.subregion
            .as_ref()
            .map(|sub| (r.region.clone(), sub.clone()))
    })
}

pub fn sum_by_period<C: Counts>(
    records: &[&Record<C>],
    granularity: Granularity,
) -> BTreeMap<NaiveDate, C> {
    sum_by(records, |r| Some(granularity.bucket_end(r.date)))
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn adult_share(counts: &EnrolmentCounts) -> f64 {
    ratio(counts.age_18_plus, counts.total())
}

/// Percent change from the first to the last finite point, rounded to two
/// places. 0 for an empty series or a zero first point.
pub fn growth(series: &[f64]) -> f64 {
    let mut points = series.iter().copied().filter(|v| v.is_finite());
    let Some(first) = points.next() else {
        return 0.0;
    };
    let last = points.last().unwrap_or(first);
    if first == 0.0 {
        return 0.0;
    }
    round2((last - first) / first * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
