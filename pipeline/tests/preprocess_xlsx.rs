use std::path::Path;
use std::process::Command;

use chat_pipeline::preprocess::{find_workbooks, process_files, process_workbook};
use chat_pipeline::{load_qa_pairs, Message};
use rust_xlsxwriter::Workbook;

const HEADER: [&str; 7] = [
    "序号",
    "sys_response1",
    "usr_query2",
    "usr_intent2",
    "sys_response3",
    "usr_query4",
    "sys_response5",
];

/// Two dialogues: one with a numeric row id and two answered turns, one
/// without an id and a single answered turn.
fn write_conversations(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in HEADER.iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }

    sheet.write_number(1, 0, 12.0).unwrap();
    sheet.write_string(1, 1, "您好，请问有什么可以帮您？").unwrap();
    sheet.write_string(1, 2, " 我要开发票 ").unwrap();
    sheet.write_string(1, 3, "invoice").unwrap();
    sheet.write_string(1, 4, "请提供抬头").unwrap();
    sheet.write_string(1, 5, "公司抬头").unwrap();
    sheet.write_string(1, 6, "已为您开具").unwrap();

    sheet.write_string(2, 2, "会员卡怎么办理").unwrap();
    sheet.write_string(2, 4, "前台即可办理").unwrap();

    workbook.save(path).unwrap();
}

#[test]
fn reads_items_from_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("march.xlsx");
    write_conversations(&path);

    let items = process_workbook(&path).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["12#t2", "12#t4", "march-1#t2"]);

    assert_eq!(items[0].query, "我要开发票");
    assert_eq!(items[0].answer, "请提供抬头");
    assert_eq!(items[0].intent.as_deref(), Some("invoice"));
    assert_eq!(
        items[0].context,
        vec![Message::system("您好，请问有什么可以帮您？")]
    );

    assert!(items[1].intent.is_none());
    assert_eq!(items[1].answer, "已为您开具");
    assert_eq!(items[1].context.len(), 3);

    assert_eq!(items[2].query, "会员卡怎么办理");
    assert!(items[2].context.is_empty());
}

#[test]
fn processes_directory_in_path_order() {
    let dir = tempfile::tempdir().unwrap();
    write_conversations(&dir.path().join("b.xlsx"));
    write_conversations(&dir.path().join("a.xlsx"));

    let files = find_workbooks(dir.path()).unwrap();
    let items = process_files(&files).unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(items[2].id, "a-1#t2");
    assert_eq!(items[5].id, "b-1#t2");
}

fn run_preprocess(input_dir: &Path, output: &Path) -> String {
    let out = Command::new(env!("CARGO_BIN_EXE_preprocess"))
        .arg("--input_dir")
        .arg(input_dir)
        .arg("--output")
        .arg(output)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn cli_writes_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    write_conversations(&dir.path().join("log.xlsx"));
    let output = dir.path().join("out").join("qa_pairs.jsonl");

    let stdout = run_preprocess(dir.path(), &output);
    assert!(stdout.contains("Wrote 3 items to"), "{stdout}");

    let items = load_qa_pairs(&output).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, "12#t2");
}

#[test]
fn cli_reports_missing_workbooks() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("qa_pairs.jsonl");

    let stdout = run_preprocess(dir.path(), &output);
    assert!(stdout.contains("No .xlsx files found in"), "{stdout}");
    assert!(!output.exists());

    let stdout = run_preprocess(&dir.path().join("absent"), &output);
    assert!(stdout.contains("No .xlsx files found in"), "{stdout}");
}
