use std::fmt::Write;
use std::path::Path;

use chrono::Local;

use crate::models::{DispatchSummary, MatchReport, StudentLoad};

pub const UNMATCHED_SAMPLE: usize = 5;

/// First few unmatched names and the total, as shown when nothing matched.
pub fn no_match_message(matches: &MatchReport) -> String {
    let names = matches.unmatched_names();
    let sample: Vec<&str> = names.iter().take(UNMATCHED_SAMPLE).copied().collect();
    format!(
        "Could not match any PDFs to students!\n\n\
         Missing PDFs for: {}...\n\n\
         Total missing: {}",
        sample.join(", "),
        names.len()
    )
}

pub fn summary_message(summary: &DispatchSummary) -> String {
    format!(
        "Successfully sent {} of {} reports\n\nFailed to send: {}",
        summary.sent(),
        summary.total_records,
        summary.not_sent()
    )
}

pub fn build_report(
    csv_path: &Path,
    reports_dir: &Path,
    load: &StudentLoad,
    matches: &MatchReport,
    summary: Option<&DispatchSummary>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Report Card Delivery");
    let _ = writeln!(
        output,
        "Generated {} from {} against {}",
        Local::now().format("%Y-%m-%d %H:%M"),
        csv_path.display(),
        reports_dir.display()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");
    let _ = writeln!(
        output,
        "- {} loaded (delimiter {:?}), {} rows skipped",
        load.records.len(),
        load.delimiter,
        load.skipped.len()
    );
    for row in load.skipped.iter() {
        let _ = writeln!(output, "  - line {}: {}", row.line, row.reason);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Matched Reports");
    if matches.matched.is_empty() {
        let _ = writeln!(output, "No reports matched.");
    } else {
        for pair in matches.matched.iter() {
            let file = pair
                .report
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} ({}) -> {}",
                pair.student.student_name(),
                pair.student.parent_email(),
                file
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Missing Reports");
    if matches.unmatched.is_empty() {
        let _ = writeln!(output, "Every student has a report.");
    } else {
        for student in matches.unmatched.iter() {
            let _ = writeln!(
                output,
                "- {} (line {})",
                student.student_name(),
                student.line()
            );
        }
    }

    if let Some(summary) = summary {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Delivery");
        let _ = writeln!(output, "Run {}", summary.run_id);
        let _ = writeln!(
            output,
            "- sent {} of {} reports ({} attempted)",
            summary.sent(),
            summary.total_records,
            summary.attempted()
        );
        for (recipient, reason) in summary.failures() {
            let _ = writeln!(output, "- failed {}: {}", recipient, reason);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_students;
    use crate::models::{DispatchOutcome, MatchedPair};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn sample() -> (StudentLoad, MatchReport) {
        let load = parse_students(
            "student_name,parent_email\n\
             John Smith,john@example.com\n\
             ,nobody@example.com\n\
             A1,a1@example.com\n\
             A2,a2@example.com\n\
             A3,a3@example.com\n\
             A4,a4@example.com\n\
             A5,a5@example.com\n\
             A6,a6@example.com\n",
        )
        .expect("parse");
        let mut records = load.records.clone().into_iter();
        let john = records.next().expect("john");
        let matches = MatchReport {
            matched: vec![MatchedPair {
                student: john,
                report: PathBuf::from("/reports/John_Smith.pdf"),
            }],
            unmatched: records.collect(),
        };
        (load, matches)
    }

    #[test]
    fn no_match_message_lists_first_five_names() {
        let (_, mut matches) = sample();
        matches.matched.clear();
        let message = no_match_message(&matches);
        assert!(message.contains("Missing PDFs for: A1, A2, A3, A4, A5..."));
        assert!(!message.contains("A6,"));
        assert!(message.ends_with("Total missing: 6"));
    }

    #[test]
    fn summary_uses_loaded_total_as_denominator() {
        let summary = DispatchSummary {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            finished_at: Local::now(),
            outcomes: vec![
                DispatchOutcome::Sent {
                    recipient: "john@example.com".to_string(),
                },
                DispatchOutcome::Failed {
                    recipient: "jane@example.com".to_string(),
                    reason: "550 rejected".to_string(),
                },
            ],
            total_records: 7,
        };
        assert_eq!(
            summary_message(&summary),
            "Successfully sent 1 of 7 reports\n\nFailed to send: 6"
        );
    }

    #[test]
    fn report_lists_skipped_matched_and_missing() {
        let (load, matches) = sample();
        let report = build_report(
            Path::new("students.csv"),
            Path::new("/reports"),
            &load,
            &matches,
            None,
        );

        assert!(report.starts_with("# Report Card Delivery\n"));
        assert!(report.contains("- 7 loaded (delimiter ','), 1 rows skipped"));
        assert!(report.contains("  - line 3: empty student_name"));
        assert!(report.contains("- John Smith (john@example.com) -> John_Smith.pdf"));
        assert!(report.contains("- A6 (line 9)"));
        assert!(!report.contains("## Delivery"));
    }
}
