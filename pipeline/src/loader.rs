use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::KnowledgeItem;

/// Reads knowledge items from a JSONL file, skipping blank lines.
pub fn load_qa_pairs(path: impl AsRef<Path>) -> Result<Vec<KnowledgeItem>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::DataNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut items = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PipelineError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item: KnowledgeItem = serde_json::from_str(line).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        items.push(item);
    }

    log::info!("Loaded {} knowledge items from {}", items.len(), path.display());
    Ok(items)
}

/// Writes one compact JSON object per line, creating parent directories.
pub fn write_jsonl(items: &[KnowledgeItem], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for (idx, item) in items.iter().enumerate() {
        serde_json::to_writer(&mut writer, item).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        writer.write_all(b"\n").map_err(|e| PipelineError::io(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[test]
    fn loads_items_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"id":"1#t2","query":"开发票","answer":"可以开","intent":"invoice","context":[{"role":"system","text":"您好"}]}"#,
                "\n\n   \n",
                r#"{"query":"退货"}"#,
                "\n"
            ),
        )
        .unwrap();

        let items = load_qa_pairs(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].intent.as_deref(), Some("invoice"));
        assert_eq!(items[0].context, vec![Message::system("您好")]);
        assert_eq!(items[1].id, "");
        assert!(items[1].intent.is_none());
    }

    #[test]
    fn reports_line_of_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        fs::write(&path, "{\"query\":\"a\"}\n{not json}\n").unwrap();

        match load_qa_pairs(&path).unwrap_err() {
            PipelineError::Json { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_qa_pairs("/nonexistent/qa.jsonl").unwrap_err();
        assert!(err.to_string().starts_with("QA data not found"));
    }

    #[test]
    fn write_keeps_unicode_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/qa.jsonl");
        let items = vec![KnowledgeItem {
            id: "a#t2".into(),
            query: "开发票".into(),
            answer: "可以".into(),
            intent: None,
            context: vec![],
        }];

        write_jsonl(&items, &path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "{\"id\":\"a#t2\",\"query\":\"开发票\",\"answer\":\"可以\",\"intent\":null,\"context\":[]}\n"
        );
        assert_eq!(load_qa_pairs(&path).unwrap(), items);
    }
}
