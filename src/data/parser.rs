use super::encoding::is_suspect_cell;
use super::error::DataError;
use super::model::Row;

// ---------------------------------------------------------------------------
// Parsed table – parser output, input to `Dataset::populate`
// ---------------------------------------------------------------------------

/// Header row + data rows produced from a CSV document or a spreadsheet grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    /// Distinct column names in header order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Data lines that failed to parse and were skipped.
    pub skipped_lines: usize,
    /// Rows containing cells that look garbled (kept, but reported).
    pub suspect_rows: usize,
    /// Rows dropped because every cell was blank.
    pub blank_rows_dropped: usize,
}

/// Placeholder used for header cells that are empty.
pub fn placeholder_column(index: usize) -> String {
    format!("列{}", index + 1)
}

// ---------------------------------------------------------------------------
// Line scanner
// ---------------------------------------------------------------------------

/// Split one line of comma-separated text into fields.
///
/// * `"` opens/closes a quoted section; `""` inside quotes is a literal `"`.
/// * `,` separates fields only outside quotes.
/// * Unquoted text is trimmed; quoted text is kept verbatim.
///
/// A quote left open at the end of the line is an error.
pub fn parse_line(line: &str) -> Result<Vec<String>, DataError> {
    let mut fields = Vec::new();
    let mut field = FieldBuf::default();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.text.push('"');
            }
            '"' => {
                in_quotes = !in_quotes;
                if in_quotes {
                    field.open_quote();
                } else {
                    field.close_quote();
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut field).finish()),
            _ => field.text.push(c),
        }
    }

    if in_quotes {
        return Err(DataError::LineParse {
            line: 0,
            reason: "unterminated quoted field".to_string(),
        });
    }
    fields.push(field.finish());
    Ok(fields)
}

/// Field text plus the byte span that came from inside quotes.
#[derive(Default)]
struct FieldBuf {
    text: String,
    quoted_start: Option<usize>,
    quoted_end: usize,
}

impl FieldBuf {
    fn open_quote(&mut self) {
        if self.quoted_start.is_none() {
            self.quoted_start = Some(self.text.len());
        }
    }

    fn close_quote(&mut self) {
        self.quoted_end = self.text.len();
    }

    fn finish(self) -> String {
        match self.quoted_start {
            None => self.text.trim().to_string(),
            Some(start) => {
                let end = self.quoted_end.max(start);
                let mut out = String::with_capacity(self.text.len());
                out.push_str(self.text[..start].trim_start());
                out.push_str(&self.text[start..end]);
                out.push_str(self.text[end..].trim_end());
                out
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Document parser
// ---------------------------------------------------------------------------

const BOMS: [&str; 3] = ["\u{0}\u{FEFF}", "\u{FEFF}", "\u{FFFE}"];

fn strip_bom(text: &str) -> &str {
    BOMS.iter()
        .find_map(|bom| text.strip_prefix(bom))
        .unwrap_or(text)
}

/// Parse a whole CSV document: header line + data lines.
pub fn parse_document(text: &str) -> Result<ParsedTable, DataError> {
    let normalized = strip_bom(text).replace("\r\n", "\n").replace('\r', "\n");
    let normalized = normalized.trim_end_matches('\n');

    // (1-based source line number, text)
    let lines: Vec<(usize, &str)> = normalized
        .split('\n')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line))
        .collect();

    let Some(((_, header_line), data_lines)) = lines.split_first() else {
        return Err(DataError::EmptyDocument);
    };
    if data_lines.is_empty() {
        return Err(DataError::NoDataRows);
    }

    let headers = parse_line(header_line).map_err(|e| DataError::MalformedHeader(e.to_string()))?;
    if headers.iter().any(|h| is_suspect_cell(h)) {
        log::warn!("Header line may be garbled; saving the file as UTF-8 usually fixes this");
    }

    let mut skipped = 0;
    let mut records = Vec::with_capacity(data_lines.len());
    for &(line_no, line) in data_lines {
        match parse_line(line) {
            Ok(fields) => records.push(fields),
            Err(e) => {
                let e = match e {
                    DataError::LineParse { reason, .. } => DataError::LineParse {
                        line: line_no,
                        reason,
                    },
                    other => other,
                };
                log::warn!("Skipping {e}");
                skipped += 1;
            }
        }
    }

    let mut table = build_table(headers, records)?;
    table.skipped_lines = skipped;
    Ok(table)
}

/// Normalize a rows-as-arrays grid (first row = headers), as handed back by
/// the spreadsheet reader, into the same shape as [`parse_document`].
pub fn table_from_grid(grid: Vec<Vec<String>>) -> Result<ParsedTable, DataError> {
    let mut grid = grid.into_iter();
    let Some(headers) = grid.next() else {
        return Err(DataError::EmptyDocument);
    };
    let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DataError::EmptyDocument);
    }
    let records = grid
        .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect())
        .collect();
    build_table(headers, records)
}

/// Shared tail of both ingestion paths: placeholder headers, row mapping,
/// blank-row removal.
fn build_table(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<ParsedTable, DataError> {
    let headers: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { placeholder_column(i) } else { h })
        .collect();

    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for h in &headers {
        if columns.contains(h) {
            log::warn!("Duplicate column '{h}': the rightmost value wins in each row");
        } else {
            columns.push(h.clone());
        }
    }

    let mut table = ParsedTable {
        columns,
        ..ParsedTable::default()
    };

    for fields in records {
        if fields.iter().all(|f| f.trim().is_empty()) {
            table.blank_rows_dropped += 1;
            continue;
        }
        let mut row = Row::new();
        let mut suspect = false;
        for (i, header) in headers.iter().enumerate() {
            let value = fields.get(i).cloned().unwrap_or_default();
            suspect |= is_suspect_cell(&value);
            row.insert(header.clone(), value);
        }
        if suspect {
            table.suspect_rows += 1;
        }
        table.rows.push(row);
    }

    if table.rows.is_empty() {
        return Err(DataError::NoDataRows);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_quoting() {
        let fields = parse_line(r#"a,"b,c","d""e",f"#).unwrap();
        assert_eq!(fields, vec!["a", "b,c", "d\"e", "f"]);
    }

    #[test]
    fn test_parse_line_trims_unquoted_only() {
        let fields = parse_line(r#"  a  , " b " ,c"#).unwrap();
        assert_eq!(fields, vec!["a", " b ", "c"]);
    }

    #[test]
    fn test_parse_line_empty_fields() {
        assert_eq!(parse_line("a,,").unwrap(), vec!["a", "", ""]);
        assert_eq!(parse_line("").unwrap(), vec![""]);
        assert_eq!(parse_line(r#""""#).unwrap(), vec![""]);
    }

    #[test]
    fn test_parse_line_unterminated_quote() {
        assert!(matches!(
            parse_line(r#"a,"b"#),
            Err(DataError::LineParse { .. })
        ));
    }

    #[test]
    fn test_parse_document_basic() {
        let table = parse_document("\u{FEFF}城市,数量\r\n上海,3\r\n\r\n北京,5\r\n\r\n").unwrap();
        assert_eq!(table.columns, vec!["城市", "数量"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["城市"], "北京");
        assert_eq!(table.rows[1]["数量"], "5");
    }

    #[test]
    fn test_parse_document_pads_and_skips() {
        let table = parse_document("a,b,c\n1\n\"broken,2\n,,\n4,5,6,7\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["b"], "");
        assert_eq!(table.rows[1]["c"], "6");
        assert_eq!(table.skipped_lines, 1);
        assert_eq!(table.blank_rows_dropped, 1);
    }

    #[test]
    fn test_empty_and_header_only_documents() {
        assert_eq!(parse_document("   \n \r\n"), Err(DataError::EmptyDocument));
        assert_eq!(parse_document(""), Err(DataError::EmptyDocument));
        assert_eq!(parse_document("name,city\n"), Err(DataError::NoDataRows));
        assert_eq!(parse_document("name,city\n , \n"), Err(DataError::NoDataRows));
    }

    #[test]
    fn test_empty_header_gets_placeholder() {
        let table = parse_document("name,,age\nx,y,1\n").unwrap();
        assert_eq!(table.columns, vec!["name", "列2", "age"]);
        assert_eq!(table.rows[0]["列2"], "y");
    }

    #[test]
    fn test_duplicate_headers_last_value_wins() {
        let table = parse_document("id,id,name\n1,2,x\n").unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.rows[0]["id"], "2");
    }

    #[test]
    fn test_suspect_rows_are_counted() {
        let table = parse_document("a,b\nÃÂÃ,1\nok,2\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.suspect_rows, 1);
    }

    #[test]
    fn test_table_from_grid() {
        let grid = vec![
            vec![" 城市 ".to_string(), "".to_string()],
            vec!["上海".to_string()],
            vec!["".to_string(), " ".to_string()],
            vec!["北京".to_string(), "7".to_string()],
        ];
        let table = table_from_grid(grid).unwrap();
        assert_eq!(table.columns, vec!["城市", "列2"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["列2"], "");
        assert_eq!(table.rows[1]["列2"], "7");
        assert_eq!(table.blank_rows_dropped, 1);
    }

    #[test]
    fn test_table_from_grid_rejects_empty() {
        assert_eq!(table_from_grid(vec![]), Err(DataError::EmptyDocument));
        assert_eq!(
            table_from_grid(vec![vec!["a".to_string()]]),
            Err(DataError::NoDataRows)
        );
    }
}
