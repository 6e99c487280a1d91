//! Small demo client for the chatbot server.
//!
//! Text mode sends `--query` over `/ws` and prints the JSON answer; without
//! `--query` it reads questions from stdin over one connection, so follow-ups
//! share the conversation. Voice mode
//! streams a raw PCM16LE 16 kHz mono file to `/ws/rt`, flushes, prints the
//! answer and writes the spoken reply to `--out`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// 100 ms of 16 kHz PCM16.
const CHUNK_BYTES: usize = 3200;

#[derive(Parser, Debug)]
#[command(name = "client")]
struct Args {
    /// Server base URL, e.g. ws://127.0.0.1:9000
    #[arg(long, default_value = "ws://127.0.0.1:9000")]
    url: String,

    /// Single question to ask; omit for an interactive session.
    #[arg(long)]
    query: Option<String>,

    /// Bearer token, if the server was started with API_TOKEN.
    #[arg(long, env = "API_TOKEN")]
    auth: Option<String>,

    /// Raw PCM16LE 16 kHz mono audio; switches to voice mode.
    #[arg(long)]
    audio_file: Option<PathBuf>,

    #[arg(long, default_value = "reply.mp3")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let base = args.url.trim_end_matches('/');

    match &args.audio_file {
        Some(path) => voice(&format!("{base}/ws/rt"), &args, path).await,
        None => text(&format!("{base}/ws"), &args).await,
    }
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn open(url: &str, auth: Option<&str>) -> Result<Socket> {
    let mut request = url.into_client_request()?;
    if let Some(token) = auth {
        request
            .headers_mut()
            .insert("Authorization", HeaderValue::from_str(&format!("Bearer {token}"))?);
    }
    let (socket, _) = connect_async(request)
        .await
        .with_context(|| format!("Cannot connect to {url}"))?;
    Ok(socket)
}

async fn ask(socket: &mut Socket, query: &str) -> Result<()> {
    socket.send(Message::Text(query.to_string())).await?;
    while let Some(frame) = socket.next().await {
        if let Message::Text(reply) = frame? {
            let json: serde_json::Value = serde_json::from_str(&reply)?;
            match json.get("answer").and_then(|a| a.as_str()) {
                Some(answer) => println!("bot> {answer}"),
                None => println!("bot> {json}"),
            }
            return Ok(());
        }
    }
    bail!("server closed the connection")
}

async fn text(url: &str, args: &Args) -> Result<()> {
    let mut socket = open(url, args.auth.as_deref()).await?;

    if let Some(query) = &args.query {
        println!("you> {query}");
        ask(&mut socket, query).await?;
        socket.close(None).await.ok();
        return Ok(());
    }

    println!("Connected to {url}. Type 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() || matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        ask(&mut socket, query).await?;
    }
    socket.close(None).await.ok();
    Ok(())
}

async fn voice(url: &str, args: &Args, path: &PathBuf) -> Result<()> {
    let pcm = tokio::fs::read(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let mut socket = open(url, args.auth.as_deref()).await?;

    for chunk in pcm.chunks(CHUNK_BYTES) {
        socket.send(Message::Binary(chunk.to_vec())).await?;
    }
    socket
        .send(Message::Text(r#"{"type":"flush"}"#.to_string()))
        .await?;
    println!("Sent {} bytes of audio", pcm.len());

    let mut audio = Vec::new();
    let mut answered = false;
    loop {
        // The server sends no end marker after the audio, so stop once it goes quiet.
        let wait = if answered {
            Duration::from_secs(2)
        } else {
            Duration::from_secs(60)
        };
        let frame = match tokio::time::timeout(wait, socket.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) | Err(_) => break,
        };
        match frame {
            Message::Text(reply) => {
                let json: serde_json::Value = serde_json::from_str(&reply)?;
                if json.get("answer").is_none() {
                    bail!("server replied {json}");
                }
                println!("bot> {}", serde_json::to_string_pretty(&json)?);
                answered = true;
            }
            Message::Binary(bytes) => audio.extend_from_slice(&bytes),
            Message::Close(_) => break,
            _ => {}
        }
    }
    socket.close(None).await.ok();

    if audio.is_empty() {
        println!("No audio received");
    } else {
        tokio::fs::write(&args.out, &audio).await?;
        println!("Wrote {} bytes to {}", audio.len(), args.out.display());
    }
    Ok(())
}
