// src/utils/csv.rs

//! Minimal CSV reading and writing for the admin import/export endpoints.
//! Exports start with a UTF-8 BOM so spreadsheet tools detect the encoding
//! of Arabic names.

pub const BOM: char = '\u{feff}';

/// Quotes a field when it contains a separator, a quote or a line break.
pub fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Joins fields into one CSV line (without the line terminator).
pub fn write_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds a whole document: BOM, header, then one line per row.
pub fn write_document<S: AsRef<str>>(header: &[&str], rows: &[Vec<S>]) -> String {
    let mut out = String::new();
    out.push(BOM);
    out.push_str(&write_record(header));
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&write_record(row));
        out.push_str("\r\n");
    }
    out
}

/// Splits one line into fields. Doubled quotes inside a quoted field are
/// unescaped.
pub fn parse_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    fields.push(buf);
    fields
}

/// A parsed data line with its 1-based line number in the source.
#[derive(Debug, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Parses a document, dropping the BOM, the header line and blank lines.
/// Quoted fields may span line breaks. Fields are trimmed.
pub fn parse_document(body: &str) -> Vec<Record> {
    split_records(body.trim_start_matches(BOM))
        .into_iter()
        .skip(1)
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(line, text)| Record {
            line,
            fields: parse_record(text.trim_end_matches('\r'))
                .into_iter()
                .map(|f| f.trim().to_string())
                .collect(),
        })
        .collect()
}

/// Cuts the body at line breaks outside quotes. Each record carries the
/// line it starts on.
fn split_records(body: &str) -> Vec<(usize, String)> {
    let mut records = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut start = 1;

    for ch in body.chars() {
        match ch {
            '\n' if !in_quotes => {
                records.push((start, std::mem::take(&mut buf)));
                line += 1;
                start = line;
            }
            '\n' => {
                buf.push(ch);
                line += 1;
            }
            '"' => {
                in_quotes = !in_quotes;
                buf.push(ch);
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() {
        records.push((start, buf));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        assert_eq!(
            parse_record(r#"S-1,"Mina, Jr.","say ""hi""",كشافة"#),
            vec!["S-1", "Mina, Jr.", r#"say "hi""#, "كشافة"]
        );
    }

    #[test]
    fn document_skips_bom_header_and_blank_lines() {
        let body = "\u{feff}code,name\r\nS-1,Mina\r\n\r\n S-2 , Mark \r\n";
        let records = parse_document(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], Record { line: 2, fields: vec!["S-1".into(), "Mina".into()] });
        assert_eq!(records[1].line, 4);
        assert_eq!(records[1].fields, vec!["S-2", "Mark"]);
    }

    #[test]
    fn written_document_parses_back() {
        let doc = write_document(&["code", "name"], &[vec!["S-1", "Mina, Jr."]]);
        assert!(doc.starts_with(BOM));
        assert_eq!(parse_document(&doc)[0].fields, vec!["S-1", "Mina, Jr."]);
    }

    #[test]
    fn quoted_line_breaks_stay_in_one_record() {
        let doc = write_document(
            &["code", "text", "note"],
            &[vec!["Q-1", "first line\nsecond line", "x"], vec!["Q-2", "plain", "y"]],
        );
        let records = parse_document(&doc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["Q-1", "first line\nsecond line", "x"]);
        assert_eq!(records[1].line, 4);
        assert_eq!(records[1].fields, vec!["Q-2", "plain", "y"]);
    }
}
