//! Conversion of logged conversations (`.xlsx`) into knowledge items.
//!
//! Each worksheet row is one dialogue laid out left to right as
//! `sys_response1, usr_query2, usr_intent2, sys_response3, usr_query4, ...`.
//! Every user query followed by a system response becomes one item, carrying
//! the conversation so far as its context.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::models::{KnowledgeItem, Message};

const ROW_ID_COLUMN: &str = "序号";
const FIRST_SYSTEM_COLUMN: &str = "sys_response1";
const QUERY_PREFIX: &str = "usr_query";
const INTENT_PREFIX: &str = "usr_intent";
const RESPONSE_PREFIX: &str = "sys_response";

/// One spreadsheet row keyed by header name. Absent cells read as empty.
#[derive(Debug, Clone, Default)]
pub struct ConversationRow {
    cells: HashMap<String, String>,
}

impl ConversationRow {
    pub fn new(cells: HashMap<String, String>) -> Self {
        Self { cells }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().trim().to_string()))
                .collect(),
        )
    }

    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// The user turn numbers present as `usr_query{n}` columns, ascending.
    pub fn query_steps(&self) -> Vec<u32> {
        self.cells
            .keys()
            .filter_map(|col| col.strip_prefix(QUERY_PREFIX))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn build_items_from_row(
    row: &ConversationRow,
    row_idx: usize,
    source_name: &str,
) -> Vec<KnowledgeItem> {
    let row_id_base = match row.get(ROW_ID_COLUMN) {
        "" => format!("{source_name}-{row_idx}"),
        id => id.to_string(),
    };

    let mut context: Vec<Message> = Vec::new();
    let greeting = row.get(FIRST_SYSTEM_COLUMN);
    if !greeting.is_empty() {
        context.push(Message::system(greeting));
    }

    let mut items = Vec::new();
    for step in row.query_steps() {
        let query = row.get(&format!("{QUERY_PREFIX}{step}"));
        let intent = row.get(&format!("{INTENT_PREFIX}{step}"));
        let answer = row.get(&format!("{RESPONSE_PREFIX}{}", step + 1));

        if query.is_empty() || answer.is_empty() {
            // An unanswered query still shapes what later turns refer back to.
            if !query.is_empty() {
                context.push(Message::user(query));
            }
            continue;
        }

        items.push(KnowledgeItem {
            id: format!("{row_id_base}#t{step}"),
            query: query.to_string(),
            answer: answer.to_string(),
            intent: (!intent.is_empty()).then(|| intent.to_string()),
            context: context.clone(),
        });

        context.push(Message::user(query));
        context.push(Message::system(answer));
    }
    items
}

/// Renders a cell the way it reads in the sheet; integral numbers lose their `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Reads the first worksheet of an `.xlsx` file; the first row is the header.
pub fn process_workbook(path: &Path) -> Result<Vec<KnowledgeItem>> {
    let spreadsheet_err = |message: String| PipelineError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook: Xlsx<BufReader<File>> =
        open_workbook(path).map_err(|e: XlsxError| spreadsheet_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_err("workbook has no worksheets".to_string()))?
        .map_err(|e| spreadsheet_err(e.to_string()))?;

    let source_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header.iter().map(cell_to_string).collect();

    let mut items = Vec::new();
    for (row_idx, cells) in rows.enumerate() {
        let row = ConversationRow::new(
            columns
                .iter()
                .zip(cells.iter().map(cell_to_string))
                .filter(|(col, _)| !col.is_empty())
                .map(|(col, value)| (col.clone(), value))
                .collect(),
        );
        items.extend(build_items_from_row(&row, row_idx, &source_name));
    }

    log::info!("Extracted {} items from {}", items.len(), path.display());
    Ok(items)
}

/// The `.xlsx` files directly inside `input_dir`, sorted by path.
pub fn find_workbooks(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir).map_err(|e| PipelineError::io(input_dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(input_dir, e))?.path();
        let is_xlsx = path
            .extension()
            .map(|ext| ext == "xlsx")
            .unwrap_or(false);
        if is_xlsx && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses workbooks in parallel and concatenates their items in path order.
pub fn process_files(files: &[PathBuf]) -> Result<Vec<KnowledgeItem>> {
    let per_file = files
        .par_iter()
        .map(|path| process_workbook(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ConversationRow {
        ConversationRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn builds_items_with_rolling_context() {
        let r = row(&[
            ("序号", "12"),
            ("sys_response1", "您好，请问有什么可以帮您？"),
            ("usr_query2", "我要开发票"),
            ("usr_intent2", "invoice"),
            ("sys_response3", "请提供抬头"),
            ("usr_query4", "公司抬头"),
            ("usr_intent4", ""),
            ("sys_response5", "已为您开具"),
        ]);

        let items = build_items_from_row(&r, 0, "log");
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "12#t2");
        assert_eq!(items[0].intent.as_deref(), Some("invoice"));
        assert_eq!(items[0].context, vec![Message::system("您好，请问有什么可以帮您？")]);

        assert_eq!(items[1].id, "12#t4");
        assert!(items[1].intent.is_none());
        assert_eq!(
            items[1].context,
            vec![
                Message::system("您好，请问有什么可以帮您？"),
                Message::user("我要开发票"),
                Message::system("请提供抬头"),
            ]
        );
    }

    #[test]
    fn unanswered_query_joins_context_only() {
        let r = row(&[
            ("usr_query2", "在吗"),
            ("sys_response3", ""),
            ("usr_query4", "开发票"),
            ("sys_response5", "可以"),
        ]);

        let items = build_items_from_row(&r, 3, "march");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "march-3#t4");
        assert_eq!(items[0].context, vec![Message::user("在吗")]);
    }

    #[test]
    fn steps_sorted_numerically() {
        let r = row(&[
            ("usr_query10", "a"),
            ("usr_query2", "b"),
            ("usr_queryX", "c"),
            ("other", "d"),
        ]);
        assert_eq!(r.query_steps(), vec![2, 10]);
    }

    #[test]
    fn from_pairs_trims_values() {
        let r = row(&[("usr_query2", "  开发票 \n")]);
        assert_eq!(r.get("usr_query2"), "开发票");
        assert_eq!(r.get("missing"), "");
    }

    #[test]
    fn cell_rendering() {
        assert_eq!(cell_to_string(&Data::Float(12.0)), "12");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::String(" x ".into())), "x");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn find_workbooks_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.xlsx"), b"").unwrap();
        fs::write(dir.path().join("a.xlsx"), b"").unwrap();
        fs::write(dir.path().join("upper.XLSX"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("dir.xlsx")).unwrap();

        let found = find_workbooks(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx"]);
    }

    #[test]
    fn invalid_workbook_is_spreadsheet_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip").unwrap();
        let err = process_files(&[path]).unwrap_err();
        assert!(matches!(err, PipelineError::Spreadsheet { .. }));
    }
}
