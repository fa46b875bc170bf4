use anyhow::{Context, Result};
use chatterm::config::Config;
use chatterm::controller::Controller;
use chatterm::render;
use chatterm::reply::HttpReplyService;
use chatterm::terminal::TerminalView;
use chatterm::transcript::Transcript;
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Html,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let _bin = args.remove(0);
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "chat" => run_chat(&args[1..]).await,
        "send" => run_send(&args[1..]).await,
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_chat(args: &[String]) -> Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--help" | "-h" => {
                print_chat_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown chat argument: {other}"));
            }
        }
    }

    let cfg = Config::load_or_default(config_path.as_deref())?;
    init_logging(&cfg.log.filter);

    let stdout = std::io::stdout();
    let ansi = stdout.is_terminal();
    let view = TerminalView::new(stdout, cfg.render.markup, cfg.render.history_lines, ansi);
    let service = Arc::new(HttpReplyService::default());
    info!(url = service.url(), "chat started");

    let mut controller = Controller::new(view, service).with_delivery(cfg.exchange.delivery);
    controller
        .view_mut()
        .redraw()
        .context("failed to draw transcript")?;

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(line) => {
                    let text = line.context("failed to read input")?;
                    controller.submit(text);
                }
                None => break,
            },
            Some(_) = controller.next_settled() => {}
            _ = tokio::signal::ctrl_c() => {
                if ansi {
                    println!();
                }
                return Ok(());
            }
        }
    }

    debug!(in_flight = controller.in_flight(), "input closed, waiting for replies");
    tokio::select! {
        _ = controller.settle_all() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    if ansi {
        println!();
    }
    Ok(())
}

async fn run_send(args: &[String]) -> Result<()> {
    let mut message: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut format = OutputFormat::Text;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--message" => {
                let value = args.get(i + 1).context("--message requires a value")?;
                message = Some(value.to_string());
                i += 2;
            }
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--format" => {
                let value = args.get(i + 1).context("--format requires a value")?;
                format = parse_format(value)?;
                i += 2;
            }
            "--help" | "-h" => {
                print_send_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown send argument: {other}"));
            }
        }
    }

    let message = message.context("--message is required")?;
    let cfg = Config::load_or_default(config_path.as_deref())?;
    init_logging(&cfg.log.filter);

    let service = Arc::new(HttpReplyService::default());
    let mut controller =
        Controller::new(Transcript::new(), service).with_delivery(cfg.exchange.delivery);
    controller.submit(message);
    controller.settle_all().await;

    let transcript = controller.into_view();
    let ansi = std::io::stdout().is_terminal();
    println!("{}", format_transcript(&transcript, format, cfg.render.markup, ansi)?);
    Ok(())
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match value {
        "text" => Ok(OutputFormat::Text),
        "html" => Ok(OutputFormat::Html),
        "json" => Ok(OutputFormat::Json),
        other => Err(anyhow::anyhow!("unknown format: {other} (expected text, html or json)")),
    }
}

fn format_transcript(
    transcript: &Transcript,
    format: OutputFormat,
    policy: render::MarkupPolicy,
    ansi: bool,
) -> Result<String> {
    let out = match format {
        OutputFormat::Text => transcript
            .entries()
            .iter()
            .map(|entry| render::entry_line(entry, policy, ansi))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Html => render::transcript_html(transcript.entries(), policy),
        OutputFormat::Json => serde_json::to_string_pretty(transcript.entries())
            .context("failed to serialize transcript")?,
    };
    Ok(out)
}

fn print_usage() {
    eprintln!(
        "chatterm usage:\n  chatterm chat [--config <path>]\n  chatterm send --message <text> [options]"
    );
}

fn print_chat_usage() {
    eprintln!("chatterm chat options:\n  --config <path>");
}

fn print_send_usage() {
    eprintln!(
        "chatterm send options:\n  --message <text>\n  --config <path>\n  --format <text|html|json>"
    );
}
