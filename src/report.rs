use std::fmt::Write;

use crate::models::{RankingRow, Source, Summary};
use crate::query::HealthView;
use crate::risk::RiskOverview;

pub struct ReportInput<'a> {
    pub scope: Option<&'a str>,
    pub health: &'a HealthView,
    pub summary: &'a Summary,
    pub ranking: &'a [RankingRow],
    pub risk: &'a RiskOverview,
    pub insights: &'a [String],
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    let scope_label = input.scope.unwrap_or("all regions");
    let summary = input.summary;

    let _ = writeln!(output, "# Regional Activity Briefing");
    match &summary.window {
        Some(window) => {
            let _ = writeln!(
                output,
                "Generated for {} ({} to {}), data refreshed {}",
                scope_label, window.start, window.end, summary.last_refreshed
            );
        }
        None => {
            let _ = writeln!(output, "Generated for {scope_label}; no dated records loaded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sources");
    for source in Source::ALL {
        if let Some(health) = input.health.health.get(&source) {
            let _ = writeln!(output, "- {source}: {health}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity");
    let _ = writeln!(output, "- Total activity: {}", summary.total_activity);
    let _ = writeln!(output, "- Adult share: {:.2}%", summary.adult_share_pct);
    let _ = writeln!(output, "- Regions signalling: {:.2}%", summary.regions_signal);
    let _ = writeln!(output, "- Adult share growth: {:.2}%", summary.average_growth);
    let _ = writeln!(output, "- Regions covered: {}", summary.regions_covered);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Migration Proxy Leaders");
    if input.ranking.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        for row in input.ranking.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: proxy {:.2}%, growth {:.2}%, activity {}",
                row.name, row.migration_proxy, row.growth_pct, row.total_activity
            );
        }
    }

    let risk = input.risk;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Monitor");
    let _ = writeln!(
        output,
        "System status {} (mean IRI {:.2}, {} critical regions)",
        risk.status, risk.mean_iri, risk.critical_regions
    );
    if risk.regions.is_empty() {
        let _ = writeln!(output, "No risk data.");
    } else {
        for record in risk.regions.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} IRI {:.2} ({}) IER {:.2} BCR {:.2} DV {:.2}",
                record.region, record.iri, record.tier, record.ier, record.bcr, record.dv
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    for line in input.insights {
        let _ = writeln!(output, "- {line}");
    }

    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::aggregate::tests::{date, enrol};
    use crate::loader::Datasets;
    use crate::models::SourceHealth;
    use crate::query::{self, Level, QueryParams};
    use crate::risk::{self, BirthProxyTable};
    use crate::store::Snapshot;

    fn render(snapshot: &Snapshot, scope: Option<&str>) -> String {
        let params = QueryParams {
            region: scope.map(str::to_string),
            ..Default::default()
        };
        let health = query::health(snapshot);
        let summary = query::summary(snapshot, &params);
        let ranking = query::ranking(snapshot, &params, Level::Region);
        let risk = risk::overview(risk::score_regions(&snapshot.datasets, &BirthProxyTable::default()));
        let insights = query::insights(snapshot, &params);
        build_report(&ReportInput {
            scope,
            health: &health,
            summary: &summary,
            ranking: &ranking,
            risk: &risk,
            insights: &insights,
        })
    }

    #[test]
    fn report_lists_sections_for_loaded_data() {
        let mut health = BTreeMap::new();
        health.insert(
            Source::Enrolment,
            SourceHealth::Active {
                files: 2,
                rows: 2,
                rows_dropped: 0,
            },
        );
        health.insert(Source::Biometric, SourceHealth::NoData);
        let snapshot = Snapshot::build(
            Datasets {
                enrolment: vec![
                    enrol("Bihar", Some("Patna"), date(2025, 1, 5), (1.0, 1.0, 8.0)),
                    enrol("Goa", Some("Panaji"), date(2025, 1, 6), (5.0, 4.0, 1.0)),
                ],
                ..Default::default()
            },
            health,
        );

        let report = render(&snapshot, None);
        assert!(report.starts_with("# Regional Activity Briefing"));
        assert!(report.contains("Generated for all regions (2024-10-08 to 2025-01-06)"));
        assert!(report.contains("- enrolment: active (2 files)"));
        assert!(report.contains("- biometric: no data"));
        assert!(report.contains("- Bihar: proxy 80.00%"));
        assert!(report.contains("## Risk Monitor"));
        assert!(report.contains("System status STABLE (mean IRI 0.00, 0 critical regions)"));
        assert!(report.contains("strongest intensity in Bihar, Goa."));
    }

    #[test]
    fn report_on_empty_data_degrades_gracefully() {
        let report = render(&Snapshot::empty(), Some("Bihar"));
        assert!(report.contains("Generated for Bihar; no dated records loaded."));
        assert!(report.contains("No activity recorded for this window."));
        assert!(report.contains("System status STABLE (mean IRI 0.00, 0 critical regions)"));
        assert!(report.contains("No risk data."));
        assert!(report.contains("No data available for the selected filters."));
    }
}
