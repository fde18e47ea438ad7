mod client;
mod render;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use folio_app::modules::books::models::BookInput;
use folio_kernel::settings::Settings;
use tracing_subscriber::EnvFilter;

use client::{ApiClient, ClientError};
use render::Renderer;

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Manage the book catalogue")]
struct Cli {
    /// Base URL of the book API
    #[arg(long, env = "FOLIO_API_URL", default_value = "http://localhost:8000", global = true)]
    api_url: String,

    /// Bearer token for authenticated commands
    #[arg(long, env = "FOLIO_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the API server
    Serve,
    /// Check that the API is up
    Health,
    /// Print the sign-in URL
    AuthUrl {
        #[arg(long)]
        state: Option<String>,
    },
    /// Exchange an authorization code for an access token
    Login {
        #[arg(long)]
        code: String,
    },
    /// Show the identity behind the current token
    Whoami,
    /// Work with books
    Books {
        #[command(subcommand)]
        command: BookCommand,
    },
}

#[derive(Debug, Subcommand)]
enum BookCommand {
    /// List every book
    List,
    /// Show one book
    Get { id: String },
    /// Add a book
    Add(BookArgs),
    /// Replace every field of a book
    Update {
        id: String,
        #[command(flatten)]
        book: BookArgs,
    },
    /// Delete a book
    Delete { id: String },
}

#[derive(Debug, Args)]
struct BookArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    author: String,
    #[arg(long)]
    description: Option<String>,
    /// Publication date, YYYY-MM-DD
    #[arg(long)]
    published: Option<String>,
}

impl From<BookArgs> for BookInput {
    fn from(args: BookArgs) -> Self {
        BookInput {
            title: Some(args.title),
            author: Some(args.author),
            description: args.description,
            published_date: args.published,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The server installs its own subscriber from settings.
    if !matches!(cli.command, Command::Serve) {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(io::stderr)
            .try_init()
            .ok();
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CommandError::Client(e)) => {
            eprintln!("{}", render::error_text(&e));
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load Folio settings")?;
    folio_app::run(settings).await
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("{0:#}")]
    Serve(anyhow::Error),
}

async fn execute(cli: Cli) -> Result<(), CommandError> {
    let client = ApiClient::new(&cli.api_url, cli.token, Duration::from_secs(cli.timeout))?;
    let mut out = Renderer::new(io::stdout(), cli.json);
    tracing::debug!(api = client.base_url(), "running command");

    match cli.command {
        Command::Serve => serve().await.map_err(CommandError::Serve)?,
        Command::Health => out.health(&client.health().await?)?,
        Command::AuthUrl { state } => {
            let url = client.auth_url(state.as_deref()).await?;
            out.line(&url)?;
        }
        Command::Login { code } => {
            let grant = client.login(&code).await?;
            if let Some(expires_in) = grant.expires_in {
                tracing::info!(expires_in, "token issued");
            }
            out.line(&format!("export FOLIO_TOKEN={}", grant.access_token))?;
        }
        Command::Whoami => out.identity(&client.me().await?)?,
        Command::Books { command } => match command {
            BookCommand::List => out.books(&client.list_books().await?)?,
            BookCommand::Get { id } => out.book(&client.get_book(&id).await?)?,
            BookCommand::Add(args) => out.book(&client.create_book(&args.into()).await?)?,
            BookCommand::Update { id, book } => {
                out.book(&client.update_book(&id, &book.into()).await?)?
            }
            BookCommand::Delete { id } => out.deleted(&client.delete_book(&id).await?)?,
        },
    }
    Ok(())
}
