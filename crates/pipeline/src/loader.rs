use anyhow::{Context, Result};
use common::error::PipelineError;
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Cell spellings read as missing, matching the usual dataframe defaults.
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_null_token(cell: &str) -> bool {
    NULL_TOKENS.contains(&cell.trim())
}

/// A CSV file as loaded: header names plus rows of optional cells.
///
/// Rows shorter than the header are padded with nulls; a row with more cells than the header is
/// a malformed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub dataset: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(dataset: &'static str, reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .with_context(|| format!("failed to read {dataset} header row"))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("malformed {dataset} row {}", i + 1))?;
            if record.len() > headers.len() {
                return Err(PipelineError::TooManyFields {
                    dataset,
                    row: i + 1,
                    expected: headers.len(),
                    found: record.len(),
                }
                .into());
            }
            let mut row: Vec<Option<String>> = record
                .iter()
                .map(|cell| (!is_null_token(cell)).then(|| cell.trim().to_string()))
                .collect();
            row.resize(headers.len(), None);
            rows.push(row);
        }

        Ok(Self {
            dataset,
            headers,
            rows,
        })
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the first header present among `names`, in the order given.
    pub fn first_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column_index(n))
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    pub fn null_counts(&self) -> Vec<(&str, usize)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let nulls = self.rows.iter().filter(|r| r[col].is_none()).count();
                (name.as_str(), nulls)
            })
            .collect()
    }

    /// Rows identical to some earlier row (nulls compare equal).
    pub fn duplicate_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.iter().filter(|r| !seen.insert(r.as_slice())).count()
    }
}

pub fn load_table(path: &Path, dataset: &'static str) -> Result<RawTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {dataset} CSV: {}", path.display()))?;
    let table = RawTable::from_reader(dataset, file)?;
    report(&table);
    Ok(table)
}

pub fn load_sentiment(path: &Path) -> Result<RawTable> {
    load_table(path, "sentiment")
}

pub fn load_trades(path: &Path) -> Result<RawTable> {
    load_table(path, "trader")
}

fn report(table: &RawTable) {
    let (rows, columns) = table.shape();
    let duplicates = table.duplicate_count();
    tracing::info!(
        dataset = table.dataset,
        rows,
        columns,
        duplicates,
        "loaded CSV"
    );
    for (column, nulls) in table.null_counts() {
        if nulls > 0 {
            tracing::info!(dataset = table.dataset, column, nulls, "missing values");
        }
    }
    metrics::counter!("pipeline_rows_loaded_total", "dataset" => table.dataset)
        .increment(rows as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader("test", csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_shape_and_null_counts() {
        let t = table("date,value,classification\n2024-01-01,25,Fear\n2024-01-02,,NaN\n");
        assert_eq!(t.shape(), (2, 3));
        assert_eq!(
            t.null_counts(),
            vec![("date", 0), ("value", 1), ("classification", 1)]
        );
    }

    #[test]
    fn test_duplicate_count_counts_repeats_only() {
        let t = table("a,b\n1,x\n1,x\n2,\n2,\n1,x\n");
        assert_eq!(t.duplicate_count(), 3);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let t = table("a,b,c\n1\n1,2,3\n");
        assert_eq!(t.rows[0], vec![Some("1".to_string()), None, None]);
        assert_eq!(t.rows[1].len(), 3);
    }

    #[test]
    fn test_row_with_extra_fields_is_error() {
        let csv = "Account,Closed PnL\n0xa,1\n0xa,1,EXTRA\n";
        let err = RawTable::from_reader("trader", csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::TooManyFields {
                dataset: "trader",
                row: 2,
                expected: 2,
                found: 3,
            })
        ));
    }

    #[test]
    fn test_first_column_respects_alias_order() {
        let t = table("Timestamp,Timestamp IST\n1,2\n");
        assert_eq!(t.first_column(&["Timestamp IST", "Timestamp"]), Some(1));
        assert_eq!(t.first_column(&["missing"]), None);
    }

    #[test]
    fn test_bom_and_header_whitespace_stripped() {
        let t = table("\u{feff}date , value\n2024-01-01,1\n");
        assert_eq!(t.headers, vec!["date".to_string(), "value".to_string()]);
    }

    #[test]
    fn test_load_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Account,Closed PnL\n0xabc,1.5").unwrap();
        let t = load_trades(file.path()).unwrap();
        assert_eq!(t.dataset, "trader");
        assert_eq!(t.cell(0, 1), Some("1.5"));
    }

    #[test]
    fn test_load_table_missing_file_is_error() {
        let err = load_sentiment(Path::new("/nonexistent/fear_greed.csv")).unwrap_err();
        assert!(err.to_string().contains("sentiment"));
    }
}
