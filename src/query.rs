//! Read-only views over one [`Snapshot`]. Every call is a fresh
//! filter-and-aggregate pass; degenerate input yields empty or zero
//! results, never an error.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, SecondsFormat};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{self, adult_share, growth, round2, Granularity, Scope};
use crate::models::{
    Comparisons, Counts, EnrolmentRecord, RankingRow, ScatterPoint, Source, SourceHealth,
    StreamPoint, Summary, TimePoint, Window,
};
use crate::store::{RegionIndex, Snapshot};
use crate::window::{self, Preset};

/// Adult share above which a region counts toward the summary signal.
const SIGNAL_SHARE: f64 = 0.52;
/// Migration proxy (percent) at or above which an insight is raised.
const INSIGHT_PROXY_PCT: f64 = 55.0;
const TOP_RANKED: usize = 12;
const NO_DATA_INSIGHT: &str = "No data available for the selected filters.";

/// Filters shared by every windowed view.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub preset: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl QueryParams {
    pub fn scope(&self) -> Scope {
        Scope {
            region: self.region.clone(),
            subregion: self.subregion.clone(),
        }
    }

    pub fn window(&self, anchor: NaiveDate) -> Window {
        window::resolve(
            self.preset.as_deref(),
            self.start.as_deref(),
            self.end.as_deref(),
            anchor,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Region,
    Subregion,
}

fn timestamp(snapshot: &Snapshot) -> String {
    snapshot.loaded_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthView {
    pub status: &'static str,
    pub snapshot_id: Uuid,
    pub last_refreshed: String,
    pub health: BTreeMap<Source, SourceHealth>,
}

pub fn health(snapshot: &Snapshot) -> HealthView {
    HealthView {
        status: "ok",
        snapshot_id: snapshot.id,
        last_refreshed: timestamp(snapshot),
        health: snapshot.health.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub regions: Vec<String>,
    pub subregions: RegionIndex,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub quick_presets: BTreeMap<&'static str, &'static str>,
}

pub fn meta(snapshot: &Snapshot) -> Meta {
    Meta {
        regions: snapshot.regions.keys().cloned().collect(),
        subregions: snapshot.regions.clone(),
        min_date: snapshot.min_date,
        max_date: snapshot.max_date,
        quick_presets: Preset::ALL.iter().map(|p| (p.label(), p.token())).collect(),
    }
}

pub fn summary(snapshot: &Snapshot, params: &QueryParams) -> Summary {
    let last_refreshed = timestamp(snapshot);
    let Some(anchor) = snapshot.anchor() else {
        return Summary {
            total_activity: 0,
            adult_share_pct: 0.0,
            regions_signal: 0.0,
            average_growth: 0.0,
            regions_covered: 0,
            window: None,
            last_refreshed,
        };
    };

    let window = params.window(anchor);
    let scope = params.scope();
    let data = &snapshot.datasets;
    let enrolment = aggregate::filter(&data.enrolment, &scope, &window);
    let biometric = aggregate::filter(&data.biometric, &scope, &window);
    let demographic = aggregate::filter(&data.demographic, &scope, &window);

    let enrol_totals = aggregate::total(&enrolment);
    let combined = enrol_totals.total()
        + aggregate::total(&biometric).total()
        + aggregate::total(&demographic).total();

    let monthly_shares: Vec<f64> = aggregate::sum_by_period(&enrolment, Granularity::Monthly)
        .values()
        .map(adult_share)
        .collect();

    let by_region = aggregate::sum_by_region(&enrolment);
    let regions_signal = if scope.region.is_none() && !by_region.is_empty() {
        let signalling = by_region
            .values()
            .filter(|counts| adult_share(counts) > SIGNAL_SHARE)
            .count();
        round2(signalling as f64 / by_region.len() as f64 * 100.0)
    } else {
        0.0
    };

    Summary {
        total_activity: combined as u64,
        adult_share_pct: round2(adult_share(&enrol_totals) * 100.0),
        regions_signal,
        average_growth: growth(&monthly_shares),
        regions_covered: by_region.len(),
        window: Some(window),
        last_refreshed,
    }
}

/// Adult share and activity per bucket. Once any row matches, every
/// bucket of the window appears, empty ones as zeros.
pub fn timeseries(snapshot: &Snapshot, params: &QueryParams, granularity: Granularity) -> Vec<TimePoint> {
    let Some(anchor) = snapshot.anchor() else {
        return Vec::new();
    };
    let window = params.window(anchor);
    let enrolment = aggregate::filter(&snapshot.datasets.enrolment, &params.scope(), &window);
    if enrolment.is_empty() {
        return Vec::new();
    }

    let sums = aggregate::sum_by_period(&enrolment, granularity);
    granularity
        .buckets(&window)
        .into_iter()
        .map(|bucket| {
            let counts = sums.get(&bucket).copied().unwrap_or_default();
            TimePoint {
                date: bucket,
                adult_share_pct: round2(adult_share(&counts) * 100.0),
                total_activity: counts.total() as u64,
            }
        })
        .collect()
}

fn ranking_row(id: String, region: String, name: String, rows: &[&EnrolmentRecord]) -> RankingRow {
    let totals = aggregate::total(rows);
    let monthly_adults: Vec<f64> = aggregate::sum_by_period(rows, Granularity::Monthly)
        .values()
        .map(|counts| counts.age_18_plus)
        .collect();
    RankingRow {
        id,
        region,
        name,
        migration_proxy: round2(adult_share(&totals) * 100.0),
        growth_pct: growth(&monthly_adults),
        total_activity: totals.total() as u64,
    }
}

/// Regions (or the sub-regions of the filtered region) ranked by migration
/// proxy, highest first. Sub-region level without a region filter ranks
/// regions.
pub fn ranking(snapshot: &Snapshot, params: &QueryParams, level: Level) -> Vec<RankingRow> {
    let Some(anchor) = snapshot.anchor() else {
        return Vec::new();
    };
    let scope = params.scope();
    let window = params.window(anchor);
    let enrolment = aggregate::filter(&snapshot.datasets.enrolment, &scope, &window);

    let level = if scope.region.is_none() {
        Level::Region
    } else {
        level
    };

    let mut rows: Vec<RankingRow> = match level {
        Level::Region => aggregate::group_by(&enrolment, |r| Some(r.region.clone()))
            .into_iter()
            .map(|(region, group)| ranking_row(region.clone(), region.clone(), region, &group))
            .collect(),
        Level::Subregion => aggregate::group_by(&enrolment, |r| {
            r.subregion.clone().map(|sub| (r.region.clone(), sub))
        })
        .into_iter()
        .map(|((region, sub), group)| {
            let name = format!("{sub}, {region}");
            ranking_row(sub, region, name, &group)
        })
        .collect(),
    };

    rows.sort_by(|a, b| {
        b.migration_proxy
            .partial_cmp(&a.migration_proxy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

pub fn comparisons(snapshot: &Snapshot, params: &QueryParams) -> Comparisons {
    let rows = ranking(snapshot, params, Level::Region);
    let scatter = rows
        .iter()
        .map(|row| ScatterPoint {
            region: row.region.clone(),
            growth_pct: row.growth_pct,
            total_activity: row.total_activity,
            migration_proxy: row.migration_proxy,
        })
        .collect();
    Comparisons {
        regions: rows.into_iter().take(TOP_RANKED).collect(),
        scatter,
    }
}

fn join_regions(rows: &[&RankingRow]) -> String {
    rows.iter()
        .map(|row| row.region.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn insights(snapshot: &Snapshot, params: &QueryParams) -> Vec<String> {
    let rows = ranking(snapshot, params, Level::Region);
    if rows.is_empty() {
        return vec![NO_DATA_INSIGHT.to_string()];
    }

    let top_intensity: Vec<&RankingRow> = rows.iter().take(3).collect();
    let mut by_growth: Vec<&RankingRow> = rows.iter().collect();
    by_growth.sort_by(|a, b| {
        b.growth_pct
            .partial_cmp(&a.growth_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    by_growth.truncate(3);

    let mut out = vec![
        format!(
            "Adult activity shows strongest intensity in {}.",
            join_regions(&top_intensity)
        ),
        format!(
            "Fastest recent growth in adult activity: {}.",
            join_regions(&by_growth)
        ),
    ];

    let high_signal = rows
        .iter()
        .filter(|row| row.migration_proxy >= INSIGHT_PROXY_PCT)
        .count();
    if high_signal > 0 {
        out.push(format!(
            "{high_signal} regions exceed the 55% adult-activity proxy threshold, suggesting elevated migration pull factors."
        ));
    }
    out
}

/// Per-bucket counts of all three sources side by side over the full
/// datasets, optionally narrowed to one region.
pub fn stream_trend(snapshot: &Snapshot, region: Option<&str>, granularity: Granularity) -> Vec<StreamPoint> {
    let scope = Scope {
        region: region.map(str::to_string),
        subregion: None,
    };
    let data = &snapshot.datasets;
    let enrolment: Vec<_> = data.enrolment.iter().filter(|r| scope.matches(r)).collect();
    let biometric: Vec<_> = data.biometric.iter().filter(|r| scope.matches(r)).collect();
    let demographic: Vec<_> = data.demographic.iter().filter(|r| scope.matches(r)).collect();

    let enrol = aggregate::sum_by_period(&enrolment, granularity);
    let bio = aggregate::sum_by_period(&biometric, granularity);
    let demo = aggregate::sum_by_period(&demographic, granularity);

    let buckets: BTreeSet<NaiveDate> = enrol
        .keys()
        .chain(bio.keys())
        .chain(demo.keys())
        .copied()
        .collect();

    buckets
        .into_iter()
        .map(|date| StreamPoint {
            date,
            enrolment: enrol.get(&date).copied().unwrap_or_default(),
            biometric: bio.get(&date).copied().unwrap_or_default(),
            demographic: demo.get(&date).copied().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{date, enrol};
    use crate::loader::Datasets;
    use crate::models::{Record, UpdateCounts};

    fn update(region: &str, day: NaiveDate, adults: f64) -> Record<UpdateCounts> {
        Record {
            region: region.to_string(),
            subregion: None,
            date: day,
            counts: UpdateCounts {
                age_5_17: 0.0,
                age_17_plus: adults,
            },
        }
    }

    fn snapshot() -> Snapshot {
        let datasets = Datasets {
            enrolment: vec![
                enrol("Bihar", Some("Patna"), date(2025, 1, 5), (10.0, 10.0, 20.0)),
                enrol("Bihar", Some("Gaya"), date(2025, 3, 5), (0.0, 10.0, 40.0)),
                enrol("Kerala", Some("Kochi"), date(2025, 1, 20), (30.0, 10.0, 10.0)),
                enrol("Kerala", Some("Kochi"), date(2025, 3, 20), (30.0, 10.0, 10.0)),
                enrol("Goa", Some("Panaji"), date(2025, 3, 31), (0.0, 0.0, 0.0)),
                enrol("Assam", None, date(2024, 6, 1), (1.0, 1.0, 1.0)),
            ],
            biometric: vec![update("Bihar", date(2025, 2, 1), 100.0)],
            demographic: vec![update("Kerala", date(2025, 3, 1), 7.0)],
        };
        Snapshot::build(datasets, BTreeMap::new())
    }

    fn three_months() -> QueryParams {
        QueryParams {
            preset: Some("3m".into()),
            ..Default::default()
        }
    }

    #[test]
    fn summary_combines_sources_and_signals() {
        let summary = summary(&snapshot(), &three_months());
        assert_eq!(summary.total_activity, 40 + 50 + 50 + 50 + 100 + 7);
        assert_eq!(
            summary.window,
            Some(Window {
                start: date(2024, 12, 31),
                end: date(2025, 3, 31)
            })
        );
        // 80 adults of 190 enrolments.
        assert_eq!(summary.adult_share_pct, 42.11);
        // Bihar (60/90) signals; Kerala and Goa do not.
        assert_eq!(summary.regions_signal, 33.33);
        assert_eq!(summary.regions_covered, 3);
        // Monthly adult share 30/90 in January, 50/100 in March.
        assert_eq!(summary.average_growth, 50.0);
    }

    #[test]
    fn non_finite_cells_do_not_poison_views() {
        use crate::loader::tests::{write, ENROLMENT_HEADER};
        use crate::risk::{self, BirthProxyTable};
        use crate::store::Store;
        use tempfile::tempdir;

        let dir = tempdir().expect("tempdir");
        write(
            &dir.path().join(Source::Enrolment.folder()).join("rows.csv"),
            &format!(
                "{ENROLMENT_HEADER}\n\
                 01-01-2025,Bihar,Patna,1,NaN,2,3\n\
                 01-01-2025,Kerala,Kochi,1,1,1,inf\n\
                 01-01-2025,Goa,Panaji,1,4,5,6\n\
                 01-01-2025,Assam,Guwahati,1,2,2,2\n"
            ),
        );
        let store = Store::load(dir.path());
        let snapshot = store.snapshot();

        let summary = summary(&snapshot, &three_months());
        assert_eq!(summary.total_activity, 5 + 2 + 15 + 6);
        // 11 adults of 28.
        assert_eq!(summary.adult_share_pct, 39.29);

        let rows = ranking(&snapshot, &three_months(), Level::Region);
        let order: Vec<(&str, f64, u64)> = rows
            .iter()
            .map(|r| (r.region.as_str(), r.migration_proxy, r.total_activity))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Bihar", 60.0, 5),
                ("Goa", 40.0, 15),
                ("Assam", 33.33, 6),
                ("Kerala", 0.0, 2)
            ]
        );

        let scores = risk::score_regions(&snapshot.datasets, &BirthProxyTable::default());
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|r| r.iri.is_finite() && r.ier.is_finite()));
        assert!(scores.iter().all(|r| r.tier == crate::models::Tier::Low));
    }

    #[test]
    fn summary_on_empty_store_is_zeroed() {
        let summary = summary(&Snapshot::empty(), &QueryParams::default());
        assert_eq!(summary.total_activity, 0);
        assert_eq!(summary.window, None);
        assert_eq!(summary.regions_covered, 0);
    }

    #[test]
    fn region_filter_suppresses_signal() {
        let params = QueryParams {
            region: Some("Bihar".into()),
            ..three_months()
        };
        let summary = summary(&snapshot(), &params);
        assert_eq!(summary.regions_signal, 0.0);
        assert_eq!(summary.regions_covered, 1);
        assert_eq!(summary.total_activity, 40 + 50 + 100);
    }

    #[test]
    fn timeseries_zero_fills_window_buckets() {
        let series = timeseries(&snapshot(), &three_months(), Granularity::Monthly);
        let dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 12, 31), date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
        assert_eq!(series[0].total_activity, 0);
        assert_eq!(series[2].total_activity, 0);
        assert_eq!(series[2].adult_share_pct, 0.0);
        assert_eq!(series[1].total_activity, 90);
        assert_eq!(series[3].adult_share_pct, 50.0);

        let quarterly = timeseries(&snapshot(), &three_months(), Granularity::Quarterly);
        assert_eq!(quarterly.len(), 2);
        assert_eq!(quarterly[1].total_activity, 190);
    }

    #[test]
    fn timeseries_without_matching_rows_is_empty() {
        let params = QueryParams {
            region: Some("Atlantis".into()),
            ..three_months()
        };
        assert!(timeseries(&snapshot(), &params, Granularity::Monthly).is_empty());
    }

    #[test]
    fn ranking_orders_by_migration_proxy() {
        let rows = ranking(&snapshot(), &three_months(), Level::Region);
        let regions: Vec<&str> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["Bihar", "Kerala", "Goa"]);
        assert_eq!(rows[0].migration_proxy, 66.67);
        assert_eq!(rows[0].growth_pct, 100.0);
        assert_eq!(rows[1].growth_pct, 0.0);
        assert_eq!(rows[2].migration_proxy, 0.0);
        assert_eq!(rows[2].total_activity, 0);

        let again = ranking(&snapshot(), &three_months(), Level::Region);
        assert_eq!(rows, again);
    }

    #[test]
    fn subregion_level_needs_a_region_filter() {
        let unscoped = ranking(&snapshot(), &three_months(), Level::Subregion);
        assert!(unscoped.iter().all(|row| row.id == row.region));

        let params = QueryParams {
            region: Some("Bihar".into()),
            ..three_months()
        };
        let rows = ranking(&snapshot(), &params, Level::Subregion);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "Gaya");
        assert_eq!(rows[0].name, "Gaya, Bihar");
        assert_eq!(rows[1].id, "Patna");
    }

    #[test]
    fn comparisons_cap_top_list_but_keep_full_scatter() {
        let enrolment = (0..20)
            .map(|i| enrol(&format!("Region {i:02}"), None, date(2025, 1, 1), (1.0, 1.0, i as f64)))
            .collect();
        let snapshot = Snapshot::build(
            Datasets {
                enrolment,
                ..Default::default()
            },
            BTreeMap::new(),
        );
        let result = comparisons(&snapshot, &QueryParams::default());
        assert_eq!(result.regions.len(), 12);
        assert_eq!(result.scatter.len(), 20);
        assert_eq!(result.regions[0].region, "Region 19");
    }

    #[test]
    fn insights_summarise_rankings() {
        let lines = insights(&snapshot(), &three_months());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Adult activity shows strongest intensity in Bihar, Kerala, Goa.");
        assert_eq!(lines[1], "Fastest recent growth in adult activity: Bihar, Kerala, Goa.");
        assert!(lines[2].starts_with("1 regions exceed the 55%"));
    }

    #[test]
    fn insights_without_data_return_fixed_sentence() {
        let lines = insights(&Snapshot::empty(), &QueryParams::default());
        assert_eq!(lines, vec![NO_DATA_INSIGHT.to_string()]);
    }

    #[test]
    fn stream_trend_aligns_all_sources() {
        let points = stream_trend(&snapshot(), None, Granularity::Monthly);
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 6, 30), date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
        assert_eq!(points[2].biometric.age_17_plus, 100.0);
        assert_eq!(points[2].enrolment.total(), 0.0);
        assert_eq!(points[3].demographic.age_17_plus, 7.0);

        let kerala = stream_trend(&snapshot(), Some("Kerala"), Granularity::Yearly);
        assert_eq!(kerala.len(), 1);
        assert_eq!(kerala[0].enrolment.total(), 100.0);
    }

    #[test]
    fn meta_lists_regions_and_presets() {
        let meta = meta(&snapshot());
        assert_eq!(meta.regions, vec!["Assam", "Bihar", "Goa", "Kerala"]);
        assert_eq!(meta.quick_presets["lastMonth"], "1m");
        assert_eq!(meta.max_date, Some(date(2025, 3, 31)));
        assert_eq!(meta.min_date, Some(date(2024, 6, 1)));
    }
}
