use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use digest_viewer::{
    create_http_client, fetch_all, fetch_markdown, handle_chat, parse_date, ChatRequest, ChatResponse,
    ContentFetcher, ViewerError,
};
use gemini_engine::{env_var, init_logging, GcsStore, GeminiClient, ObjectStore, DEFAULT_BUCKET};
use std::io::Read;
use std::time::Duration;
use tracing::{error, info};

const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "digest-viewer")]
#[command(about = "Read published digests and ask follow-up questions about them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Print a stored digest
    Show {
        /// App that published the digest, e.g. reddit_explorer
        app: String,

        /// Digest date (YYYY-MM-DD), today in UTC when omitted
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// List which digests exist for a day
    List {
        /// Digest date (YYYY-MM-DD), today in UTC when omitted
        #[arg(value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Answer a JSON chat request read from stdin
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Show { app, date } => show(&app, date.unwrap_or_else(today)).await,
        Commands::List { date } => list(date.unwrap_or_else(today)).await,
        Commands::Chat => chat().await,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn connect_store() -> Result<GcsStore, ViewerError> {
    let bucket = env_var("GCS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
    info!(bucket = %bucket, "Connecting to digest storage");
    GcsStore::connect(bucket).await.map_err(ViewerError::Storage)
}

async fn show(app_name: &str, date: NaiveDate) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = connect_store().await?;

    match fetch_markdown(&store as &dyn ObjectStore, app_name, date).await? {
        Some(markdown) => {
            println!("{}", markdown);
            Ok(())
        }
        None => Err(format!("No digest for {} on {}", app_name, date).into()),
    }
}

async fn list(date: NaiveDate) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = connect_store().await?;

    for digest in fetch_all(&store, date).await {
        let status = if digest.exists { "available" } else { "missing" };
        println!("{:<18} {}", digest.app_name, status);
    }
    Ok(())
}

async fn chat() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let response = match serde_json::from_str::<ChatRequest>(&input) {
        Ok(request) => answer_request(&request).await,
        Err(e) => {
            error!(error = %e, "Malformed chat request");
            ChatResponse::Error { error: ViewerError::InvalidRequest(e.to_string()).to_string() }
        }
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn answer_request(request: &ChatRequest) -> ChatResponse {
    let Some(api_key) = env_var("GEMINI_API_KEY") else {
        return ChatResponse::Error { error: "GEMINI_API_KEY environment variable not set".to_string() };
    };

    let clients = create_http_client().and_then(|fetch_client| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map(|llm_client| (fetch_client, llm_client))
    });
    let (fetch_client, llm_client) = match clients {
        Ok(clients) => clients,
        Err(e) => return ChatResponse::Error { error: format!("HTTP client setup failed: {}", e) },
    };

    let mut llm = GeminiClient::new(llm_client, api_key);
    if let Some(model) = env_var("GEMINI_MODEL") {
        llm = llm.with_model(model);
    }

    handle_chat(&ContentFetcher::new(fetch_client), &llm, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Commands, clap::Error> {
        Cli::try_parse_from(std::iter::once("digest-viewer").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_show_with_and_without_date() {
        assert_eq!(
            parse(&["show", "reddit_explorer", "2024-01-01"]).unwrap(),
            Commands::Show {
                app: "reddit_explorer".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1),
            }
        );
        assert_eq!(
            parse(&["show", "tech_feed"]).unwrap(),
            Commands::Show { app: "tech_feed".into(), date: None }
        );
    }

    #[test]
    fn test_list_and_chat() {
        assert_eq!(parse(&["list"]).unwrap(), Commands::List { date: None });
        assert_eq!(parse(&["chat"]).unwrap(), Commands::Chat);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["list", "01/01/2024"]).is_err());
        assert!(parse(&["show"]).is_err());
        assert!(parse(&[]).is_err());
        assert!(parse(&["publish"]).is_err());
    }
}
