use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::dialect;
use crate::error::LoadError;
use crate::models::{
    SkipReason, SkippedRow, StudentLoad, StudentRecord, PARENT_EMAIL, STUDENT_NAME,
};

const REQUIRED_COLUMNS: [&str; 2] = [STUDENT_NAME, PARENT_EMAIL];

#[cfg(test)]
pub fn load(csv_path: &Path) -> Result<Vec<StudentRecord>, LoadError> {
    load_with_report(csv_path).map(|load| load.records)
}

/// Loads students and also returns the rows that were dropped for missing a
/// name or an email.
pub fn load_with_report(csv_path: &Path) -> Result<StudentLoad, LoadError> {
    let bytes = std::fs::read(csv_path).map_err(|source| LoadError::Io {
        path: csv_path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8(bytes).map_err(|_| LoadError::Encoding {
        path: csv_path.to_path_buf(),
    })?;

    let load = parse_students(&content)?;
    info!(
        "Loaded {} students from {}",
        load.records.len(),
        csv_path.display()
    );
    Ok(load)
}

pub fn parse_students(content: &str) -> Result<StudentLoad, LoadError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = dialect::sniff_delimiter(content).ok_or(LoadError::Dialect)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|required| !headers.iter().any(|header| header == *required))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::Validation { missing });
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for result in reader.records() {
        let row = result?;
        let line = row.position().map_or(0, |pos| pos.line() as usize);

        let mut fields: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = row.get(idx).unwrap_or("").trim().to_string();
                (header.to_string(), value)
            })
            .collect();

        let student_name = fields.remove(STUDENT_NAME).unwrap_or_default();
        let parent_email = fields.remove(PARENT_EMAIL).unwrap_or_default();

        let reason = match (student_name.is_empty(), parent_email.is_empty()) {
            (false, false) => None,
            (true, false) => Some(SkipReason::MissingName),
            (false, true) => Some(SkipReason::MissingEmail),
            (true, true) => Some(SkipReason::MissingBoth),
        };
        if let Some(reason) = reason {
            debug!("Skipping CSV line {line}: {reason}");
            skipped.push(SkippedRow { line, reason });
            continue;
        }

        records.push(StudentRecord::new(line, student_name, parent_email, fields));
    }

    Ok(StudentLoad {
        records,
        skipped,
        delimiter: delimiter as char,
    })
}
