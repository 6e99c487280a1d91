use anyhow::Result;
use chat_pipeline::{load_qa_pairs, ChatPipeline, Message, PipelineConfig};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Run a local chatbot pipeline demo.
#[derive(Parser, Debug)]
#[command(name = "chatbot", version)]
struct Args {
    /// Path to config file.
    #[arg(long, env = "PIPELINE_CONFIG", default_value = "config/pipeline.json")]
    config: PathBuf,

    /// Path to QA jsonl file.
    #[arg(long, env = "PIPELINE_DATA")]
    data: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let config = PipelineConfig::load(&args.config)?;
    let data_path = match args.data {
        Some(path) => path,
        None if !config.retrieval.index_source.is_empty() => {
            PathBuf::from(&config.retrieval.index_source)
        }
        None => {
            println!("No data source configured. Set retrieval.index_source or --data.");
            return Ok(());
        }
    };
    if !data_path.exists() {
        println!("QA data not found: {}", data_path.display());
        println!("Generate data/qa_pairs.jsonl first or pass --data.");
        return Ok(());
    }

    let items = load_qa_pairs(&data_path)?;
    let pipeline = ChatPipeline::new(config, items);

    let mut context: Vec<Message> = Vec::new();
    println!("Chatbot pipeline ready. Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let user_input = line?.trim().to_string();
        if user_input.is_empty() || matches!(user_input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let response = pipeline.respond(&user_input, &context);
        println!("bot> {}", response.answer);
        context.push(Message::user(user_input));
        context.push(Message::system(response.answer));
    }

    Ok(())
}
