use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing_subscriber::EnvFilter;

use tutor_chat::cli::Args;
use tutor_chat::{ChatSession, TerminalView};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so they stay out of the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tutor_chat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;

    let mut session = ChatSession::start(&config, TerminalView::stdout());
    let stdin = BufReader::new(tokio::io::stdin());
    session.run(LinesStream::new(stdin.lines())).await?;

    Ok(())
}
