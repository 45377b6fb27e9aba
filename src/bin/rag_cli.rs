use anyhow::Result;
use clap::Parser;
use profmatch::config::{ChatArgs, EmbedderArgs, StoreArgs};
use profmatch::init_tracing;
use profmatch::rag::{render_context, respond, retrieve, QueryOptions};

#[derive(Parser, Debug)]
#[command(
    name = "profmatch-rag",
    about = "Find professors matching a question and ask an LLM to explain the match"
)]
struct RagCli {
    /// Question describing the research you want to do
    #[arg(long)]
    query: String,

    /// Number of professors retrieved as context
    #[arg(long, env = "PROFMATCH_TOP_K", default_value_t = 5)]
    top_k: usize,

    /// Sampling temperature for the answer model
    #[arg(long, env = "PROFMATCH_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Maximum tokens to request from the completion model
    #[arg(long, default_value_t = 512)]
    max_completion_tokens: usize,

    /// Only print the retrieved context (skip LLM call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    chat: ChatArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = RagCli::parse();

    let embedder = cli.embedder.build()?;
    let store = cli.store.connect()?;
    let matches = retrieve(&cli.query, &*embedder, &store, cli.top_k)?;
    if !matches.is_empty() {
        println!("--- Retrieved Context ---\n{}", render_context(&matches));
    }
    if cli.dry_run {
        println!("dry-run enabled; skipping LLM call.");
        return Ok(());
    }

    let chat = cli.chat.build(&cli.embedder.openai)?;
    let options = QueryOptions {
        top_k: cli.top_k,
        temperature: cli.temperature,
        max_tokens: cli.max_completion_tokens,
    };
    let answer = respond(&cli.query, &matches, &*chat, &options)?;
    println!("--- Answer ---\n{answer}");
    Ok(())
}
