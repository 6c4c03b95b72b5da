//! Text rendering of analysis and load results.

use std::fmt::Write;

use keyward::{AnalysisReport, LoadReport, Recommender, general_advice};

const RULE: &str = "==================================================";
const TOP_KEYS: usize = 10;
const DETAILED_KEYS: usize = 5;
const NAME_WIDTH: usize = 50;

/// Renders the big-key report. With `detailed`, the five largest keys are
/// listed again with their advice.
pub fn render_analysis(
    report: &AnalysisReport,
    recommender: &Recommender,
    detailed: bool,
) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_analysis(&mut out, report, recommender, detailed);
    out
}

fn write_analysis(
    out: &mut String,
    report: &AnalysisReport,
    recommender: &Recommender,
    detailed: bool,
) -> std::fmt::Result {
    writeln!(
        out,
        "Analysis finished in {:.2}s: {} big keys out of {} keys analysed",
        report.elapsed.as_secs_f64(),
        report.big_keys.len(),
        report.inspected,
    )?;
    if report.skipped > 0 {
        writeln!(out, "Skipped {} keys that could not be inspected", report.skipped)?;
    }
    if report.truncated {
        writeln!(out, "Key limit reached after {} keys", report.scanned)?;
    }
    if let Some(reason) = &report.interrupted {
        writeln!(out, "Scan interrupted, results are partial: {reason}")?;
    }

    if report.big_keys.is_empty() {
        writeln!(out, "No big keys found")?;
        return Ok(());
    }

    writeln!(out, "\nBIG KEY REPORT\n{RULE}")?;
    writeln!(out, "Total big keys: {}", report.big_keys.len())?;
    writeln!(out, "Total big key memory: {:.2} MB", report.total_mb())?;

    writeln!(out, "\nDistribution by type:")?;
    for (key_type, stats) in &report.by_type {
        writeln!(
            out,
            "  {key_type}: {} keys, {:.2} MB total, {:.2} MB average",
            stats.count,
            mb(stats.total_bytes as f64),
            mb(stats.average_bytes()),
        )?;
    }

    writeln!(out, "\nTop {TOP_KEYS} keys:")?;
    for (rank, record) in report.top(TOP_KEYS).iter().enumerate() {
        let name: String = record.name.chars().take(NAME_WIDTH).collect();
        writeln!(
            out,
            "  {:2}. {name:<NAME_WIDTH$} {:>6} {:>8.2} MB  ttl: {}",
            rank + 1,
            record.key_type,
            record.size_mb(),
            record.expiry(),
        )?;
    }

    if detailed {
        writeln!(out, "\nDetailed analysis:")?;
        for record in report.top(DETAILED_KEYS) {
            writeln!(out, "\n--- {} ---", record.name)?;
            writeln!(out, "Type: {}", record.key_type)?;
            writeln!(
                out,
                "Size: {:.2} MB ({} bytes)",
                record.size_mb(),
                record.size_bytes
            )?;
            writeln!(out, "Elements: {}", record.element_count)?;
            writeln!(out, "TTL: {}", record.expiry())?;
            let advice = recommender.recommend(record);
            if !advice.is_empty() {
                writeln!(out, "Recommendations:")?;
                for item in advice {
                    writeln!(out, "  - {item}")?;
                }
            }
        }
    }

    writeln!(out, "\nGeneral recommendations:")?;
    for line in general_advice() {
        writeln!(out, "  * {line}")?;
    }
    Ok(())
}

/// One-paragraph summary of a load simulation.
pub fn render_load(report: &LoadReport) -> String {
    format!(
        "Final statistics:\n  Elapsed: {:.1}s\n  Operations: {}\n  Errors: {}\n  Success rate: {:.1}%\n",
        report.elapsed.as_secs_f64(),
        report.operations,
        report.errors,
        report.success_rate(),
    )
}

fn mb(bytes: f64) -> f64 {
    bytes / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use keyward::{KeyRecord, KeyType, aggregate, classify};
    use pretty_assertions::assert_eq;

    use super::*;

    fn report_with(records: Vec<KeyRecord>) -> AnalysisReport {
        let by_type = aggregate(&records);
        let big_keys = classify(records);
        AnalysisReport {
            scanned: big_keys.len(),
            inspected: big_keys.len(),
            skipped: 0,
            big_keys,
            by_type,
            elapsed: Duration::from_millis(1500),
            truncated: false,
            interrupted: None,
        }
    }

    fn record(name: &str, key_type: KeyType, size_bytes: u64, ttl_seconds: i64) -> KeyRecord {
        KeyRecord {
            name: name.to_owned(),
            key_type,
            size_bytes,
            element_count: 6000,
            ttl_seconds,
        }
    }

    #[test]
    fn empty_report() {
        let text = render_analysis(&report_with(Vec::new()), &Recommender::default(), true);
        assert!(text.contains("0 big keys out of 0 keys analysed"));
        assert!(text.ends_with("No big keys found\n"));
    }

    #[test]
    fn detailed_report_lists_advice() {
        let report = report_with(vec![
            record("sessions", KeyType::Hash, 2 * 1024 * 1024, -1),
            record("queue", KeyType::List, 512 * 1024, 60),
        ]);
        let text = render_analysis(&report, &Recommender::default(), true);

        assert!(text.contains("Total big key memory: 2.50 MB"));
        assert!(text.contains("  hash: 1 keys, 2.00 MB total, 2.00 MB average"));
        assert!(text.contains("ttl: no ttl"));
        assert!(text.contains("ttl: 60s"));
        assert!(text.contains("--- sessions ---"));
        assert!(text.contains("  - Use HSCAN instead of HGETALL"));
        assert!(text.contains("General recommendations:"));

        let top = text.find("sessions").unwrap();
        let second = text.find("queue").unwrap();
        assert!(top < second);
    }

    #[test]
    fn summary_only_without_detail() {
        let report = report_with(vec![record("k", KeyType::Set, 200 * 1024, -2)]);
        let text = render_analysis(&report, &Recommender::default(), false);
        assert!(!text.contains("Detailed analysis"));
        assert!(text.contains("ttl: expired"));
    }

    #[test]
    fn load_summary() {
        let report = LoadReport {
            elapsed: Duration::from_secs(300),
            operations: 2400,
            errors: 12,
        };
        assert_eq!(
            render_load(&report),
            "Final statistics:\n  Elapsed: 300.0s\n  Operations: 2400\n  Errors: 12\n  Success rate: 99.5%\n"
        );
    }
}
