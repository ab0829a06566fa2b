//! Delimiter detection for CSV exports from different spreadsheet tools.

const SAMPLE_CHARS: usize = 1024;

/// Candidate delimiters in tie-break order.
const CANDIDATES: [char; 4] = [',', '\t', ';', '|'];

/// Guesses the delimiter from the start of `content`.
///
/// A delimiter is consistent when it appears the same non-zero number of times
/// on every complete line of the sample, ignoring anything inside double
/// quotes. The consistent delimiter with the highest per-line count wins. If
/// nothing is consistent the delimiter most frequent on the header line is
/// used instead.
pub fn sniff_delimiter(content: &str) -> Option<u8> {
    let (sample, truncated) = match content.char_indices().nth(SAMPLE_CHARS) {
        Some((idx, _)) => (&content[..idx], true),
        None => (content, false),
    };

    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    if truncated && lines.len() > 1 && !sample.ends_with('\n') {
        lines.pop();
    }
    let header = *lines.first()?;

    let mut best: Option<(char, usize)> = None;
    for candidate in CANDIDATES {
        let mut counts = lines.iter().map(|line| count_unquoted(line, candidate));
        let first = counts.next().unwrap_or(0);
        if first == 0 || !counts.all(|count| count == first) {
            continue;
        }
        if best.map_or(true, |(_, count)| first > count) {
            best = Some((candidate, first));
        }
    }

    if best.is_none() {
        for candidate in CANDIDATES {
            let count = count_unquoted(header, candidate);
            if count > 0 && best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((candidate, count));
            }
        }
    }

    best.map(|(delimiter, _)| delimiter as u8)
}

fn count_unquoted(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
