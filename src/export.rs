//! CSV and JSON import/export for question lists and answer records.
//!
//! The CSV dialect is the RFC 4180 core: fields containing a comma, quote,
//! or line break are wrapped in double quotes, with embedded quotes doubled.
//! The parser is a small state machine so quoted fields may span lines.

use thiserror::Error;

use crate::types::AnswerRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV has no header row")]
    MissingHeader,
    #[error("no column named '{0}' in CSV header")]
    UnknownColumn(String),
    #[error("column index {index} out of range for {width} columns")]
    ColumnOutOfRange { index: usize, width: usize },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render answer records as CSV with a `question,answer,timestamp` header.
pub fn to_csv(records: &[AnswerRecord]) -> String {
    let mut out = String::from("question,answer,timestamp\n");
    for record in records {
        out.push_str(&escape_field(&record.question));
        out.push(',');
        out.push_str(&escape_field(&record.answer));
        out.push(',');
        out.push_str(&record.timestamp.to_rfc3339());
        out.push('\n');
    }
    out
}

/// Render answer records as pretty-printed JSON.
pub fn to_json(records: &[AnswerRecord]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Parse CSV text into rows of fields. Quoted fields may contain delimiters
/// and line breaks; doubled quotes inside a quoted field decode to one quote.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    row.push(std::mem::take(&mut field));
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Extract a question list from CSV text.
///
/// `column` selects by header name, or by zero-based index when it parses as
/// a number; `None` means the column named `question`, falling back to the
/// first column when no header matches. Blank rows are dropped.
pub fn questions_from_csv(text: &str, column: Option<&str>) -> Result<Vec<String>, ExportError> {
    let rows = parse_rows(text);
    let Some(header) = rows.first() else {
        return Err(ExportError::MissingHeader);
    };

    let index = match column {
        Some(name) => {
            if let Ok(index) = name.parse::<usize>() {
                if index >= header.len() {
                    return Err(ExportError::ColumnOutOfRange {
                        index,
                        width: header.len(),
                    });
                }
                index
            } else {
                header
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
                    .ok_or_else(|| ExportError::UnknownColumn(name.to_string()))?
            }
        }
        None => header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("question"))
            .unwrap_or(0),
    };

    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|row| row.get(index))
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(question: &str, answer: &str) -> AnswerRecord {
        AnswerRecord {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let csv = to_csv(&[record("plain", "a, b"), record("say \"hi\"", "line\nbreak")]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "question,answer,timestamp");
        assert!(lines.next().unwrap().starts_with("plain,\"a, b\","));
        assert!(csv.contains("\"say \"\"hi\"\"\",\"line\nbreak\","));
    }

    #[test]
    fn parser_handles_quoted_fields_spanning_lines() {
        let rows = parse_rows("a,\"b\nc\",d\r\ne,\"f,g\",\"h\"\"i\"\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b\nc".to_string(), "d".to_string()],
                vec!["e".to_string(), "f,g".to_string(), "h\"i".to_string()],
            ]
        );
    }

    #[test]
    fn csv_round_trips_awkward_fields() {
        let records = [record("a,\"b\"\nc", "ok")];
        let rows = parse_rows(&to_csv(&records));
        assert_eq!(rows[1][0], "a,\"b\"\nc");
        assert_eq!(rows[1][1], "ok");
    }

    #[test]
    fn questions_default_to_question_column() {
        let csv = "id,Question,notes\n1,What is Rust?,x\n2,,y\n3,  Why?  ,z\n";
        let questions = questions_from_csv(csv, None).unwrap();
        assert_eq!(questions, vec!["What is Rust?".to_string(), "Why?".to_string()]);
    }

    #[test]
    fn questions_select_by_name_or_index() {
        let csv = "a,b\n1,one\n2,two\n";
        assert_eq!(
            questions_from_csv(csv, Some("b")).unwrap(),
            vec!["one".to_string(), "two".to_string()]
        );
        assert_eq!(
            questions_from_csv(csv, Some("0")).unwrap(),
            vec!["1".to_string(), "2".to_string()]
        );
        assert!(matches!(
            questions_from_csv(csv, Some("missing")),
            Err(ExportError::UnknownColumn(_))
        ));
        assert!(matches!(
            questions_from_csv(csv, Some("5")),
            Err(ExportError::ColumnOutOfRange { .. })
        ));
    }

    #[test]
    fn questions_without_header_match_fall_back_to_first_column() {
        let csv = "prompt\nfirst\nsecond\n";
        let questions = questions_from_csv(csv, None).unwrap();
        assert_eq!(questions, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn json_export_is_deserializable() {
        let records = vec![record("q", "a")];
        let json = to_json(&records).unwrap();
        let parsed: Vec<AnswerRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);
    }
}
