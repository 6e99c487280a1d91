use anyhow::{Context, Result};
use chat_pipeline::preprocess::{find_workbooks, process_files};
use chat_pipeline::write_jsonl;
use clap::Parser;
use std::path::PathBuf;

/// Convert XLSX conversation data to JSONL QA pairs.
#[derive(Parser, Debug)]
#[command(name = "preprocess", version)]
struct Args {
    /// Directory containing .xlsx files
    #[arg(long = "input_dir", default_value = "data")]
    input_dir: PathBuf,

    /// Output JSONL file path
    #[arg(long, default_value = "data/qa_pairs.jsonl")]
    output: PathBuf,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let files = if args.input_dir.is_dir() {
        find_workbooks(&args.input_dir)
            .with_context(|| format!("Cannot scan {}", args.input_dir.display()))?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        println!("No .xlsx files found in {}", args.input_dir.display());
        return Ok(());
    }

    let items = process_files(&files)?;
    write_jsonl(&items, &args.output)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;

    println!("Wrote {} items to {}", items.len(), args.output.display());
    Ok(())
}
