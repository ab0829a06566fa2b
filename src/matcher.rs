use std::path::{Path, PathBuf};

use crate::models::{MatchReport, MatchedPair, StudentRecord};

pub type CandidatePattern = (&'static str, fn(&str) -> String);

/// Report filename heuristics, highest precedence first.
pub const CANDIDATE_PATTERNS: [CandidatePattern; 6] = [
    ("exact", exact),
    ("underscored", underscored),
    ("collapsed", collapsed),
    ("report_prefix", report_prefix),
    ("last_first", last_first),
    ("initial_last", initial_last),
];

fn exact(name: &str) -> String {
    format!("{name}.pdf")
}

fn underscored(name: &str) -> String {
    format!("{}.pdf", name.replace(' ', "_"))
}

fn collapsed(name: &str) -> String {
    format!("{}.pdf", name.replace(' ', ""))
}

fn report_prefix(name: &str) -> String {
    format!("Report_{name}.pdf")
}

// Doe_John.pdf
fn last_first(name: &str) -> String {
    format!("{}_{}.pdf", last_token(name), first_token(name))
}

// JDoe.pdf
fn initial_last(name: &str) -> String {
    let initial: String = name.chars().take(1).collect();
    format!("{initial}{}.pdf", last_token(name))
}

fn first_token(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

fn last_token(name: &str) -> &str {
    name.split_whitespace().next_back().unwrap_or(name)
}

pub fn candidate_filenames(student_name: &str) -> Vec<String> {
    CANDIDATE_PATTERNS
        .iter()
        .map(|(_, pattern)| pattern(student_name))
        .collect()
}

/// Returns the first candidate that exists as a regular file in `directory`.
pub fn find_report(directory: &Path, student_name: &str) -> Option<PathBuf> {
    candidate_filenames(student_name)
        .into_iter()
        .map(|candidate| directory.join(candidate))
        .find(|path| path.is_file())
}

pub fn match_students(directory: &Path, students: &[StudentRecord]) -> MatchReport {
    let mut report = MatchReport::default();

    for student in students {
        match find_report(directory, student.student_name()) {
            Some(path) => report.matched.push(MatchedPair {
                student: student.clone(),
                report: path,
            }),
            None => report.unmatched.push(student.clone()),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_students;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"%PDF-1.4\n").expect("write pdf");
    }

    #[test]
    fn candidates_follow_fixed_order() {
        assert_eq!(
            candidate_filenames("John Smith"),
            vec![
                "John Smith.pdf",
                "John_Smith.pdf",
                "JohnSmith.pdf",
                "Report_John Smith.pdf",
                "Smith_John.pdf",
                "JSmith.pdf",
            ]
        );
    }

    #[test]
    fn single_token_names_reuse_the_token() {
        let candidates = candidate_filenames("Cher");
        assert_eq!(candidates[4], "Cher_Cher.pdf");
        assert_eq!(candidates[5], "CCher.pdf");
    }

    #[test]
    fn middle_names_use_first_and_last_tokens() {
        let candidates = candidate_filenames("Mary Ann Jones");
        assert_eq!(candidates[4], "Jones_Mary.pdf");
        assert_eq!(candidates[5], "MJones.pdf");
    }

    #[test]
    fn earliest_pattern_wins_when_several_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "JSmith.pdf");
        touch(dir.path(), "Report_John Smith.pdf");

        let found = find_report(dir.path(), "John Smith").expect("match");
        assert_eq!(found, dir.path().join("Report_John Smith.pdf"));

        touch(dir.path(), "John_Smith.pdf");
        let found = find_report(dir.path(), "John Smith").expect("match");
        assert_eq!(found, dir.path().join("John_Smith.pdf"));
    }

    #[test]
    fn returns_none_without_candidates() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "Brown Alice.pdf");
        touch(dir.path(), "Brown_Alice.txt");
        assert_eq!(find_report(dir.path(), "Alice Brown"), None);
    }

    #[test]
    fn directories_named_like_reports_do_not_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("Alice Brown.pdf")).expect("mkdir");
        assert_eq!(find_report(dir.path(), "Alice Brown"), None);
    }

    #[test]
    fn lookups_are_repeatable() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "Doe_Jane.pdf");
        let first = find_report(dir.path(), "Jane Doe");
        let second = find_report(dir.path(), "Jane Doe");
        assert_eq!(first, second);
        assert_eq!(first, Some(dir.path().join("Doe_Jane.pdf")));
    }

    #[test]
    fn partitions_students_in_load_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "John_Smith.pdf");
        touch(dir.path(), "Doe_Jane.pdf");

        let load = parse_students(
            "student_name,parent_email,grade\n\
             John Smith,john@example.com,7\n\
             Alice Brown,alice@example.com,6\n\
             Jane Doe,jane@example.com,8\n",
        )
        .expect("parse");

        let report = match_students(dir.path(), &load.records);
        assert_eq!(report.total(), 3);
        assert_eq!(report.matched.len(), 2);
        assert_eq!(report.matched[0].student.student_name(), "John Smith");
        assert_eq!(report.matched[0].report, dir.path().join("John_Smith.pdf"));
        assert_eq!(report.matched[1].report, dir.path().join("Doe_Jane.pdf"));
        assert_eq!(report.unmatched_names(), vec!["Alice Brown"]);
    }
}
