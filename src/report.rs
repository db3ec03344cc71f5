use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AttendanceRow, ClassSummary, MatchType};

pub fn summarize_by_class(rows: &[AttendanceRow]) -> Vec<ClassSummary> {
    let mut map: std::collections::HashMap<String, (usize, usize)> =
        std::collections::HashMap::new();

    for row in rows {
        let entry = map.entry(row.class_name.clone()).or_insert((0, 0));
        entry.0 += 1;
        if row.status == MatchType::NameMatch.as_str() {
            entry.1 += 1;
        }
    }

    let mut summaries: Vec<ClassSummary> = map
        .into_iter()
        .map(|(class_name, (count, name_matches))| ClassSummary {
            class_name,
            count,
            name_matches,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn build_report(
    scope: Option<&str>,
    since_days: i64,
    cutoff: DateTime<Utc>,
    rows: &[AttendanceRow],
) -> String {
    let summaries = summarize_by_class(rows);
    let id_matches = rows
        .iter()
        .filter(|r| r.status == MatchType::IdMatch.as_str())
        .count();
    let name_matches = rows.len() - id_matches;

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all classes");

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} (check-ins in the last {} days, since {})",
        scope_label,
        since_days,
        cutoff.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Match Mix");

    if rows.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        let _ = writeln!(output, "- Card-code matches: {id_matches}");
        let _ = writeln!(output, "- Fuzzy name matches: {name_matches}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Check-ins by Class");

    if summaries.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} check-ins ({} via name match)",
                summary.class_name, summary.count, summary.name_matches
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Check-ins");

    if rows.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        for row in rows.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) at {} [{}]",
                row.student_name, row.student_code, row.class_name, row.recorded_at, row.status
            );
        }
    }

    output
}
