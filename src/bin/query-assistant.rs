// ABOUTME: Interactive terminal assistant that turns questions into SQL over the sales database
// ABOUTME: Generates SQL with OpenAI, lets the user review it, and runs it read-only

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm, Editor, Input};
use std::path::PathBuf;
use tokio_postgres::Client;

use postgres_bulk_loader::assistant::{
    run_read_only_query, AssistantConfig, OpenAiClient, QueryHistory, DEFAULT_MODEL,
};
use postgres_bulk_loader::config::{Secrets, DEFAULT_SECRETS_FILE};
use postgres_bulk_loader::postgres;
use postgres_bulk_loader::schema::sales_schema;

const EXAMPLE_QUESTIONS: [&str; 4] = [
    "Show me the addresses of all customers who live in Germany.",
    "What is the description of the product category named 'Confections'?",
    "Show me all orders placed in the year 2014.",
    "Which Region has generated the highest total sales revenue?",
];

#[derive(Parser)]
#[command(name = "query-assistant")]
#[command(about = "Ask questions about the sales database in plain English", long_about = None)]
struct Cli {
    /// Secrets file with database credentials and OPENAI_API
    #[arg(long, default_value = DEFAULT_SECRETS_FILE)]
    secrets: PathBuf,
    /// OpenAI model used to generate SQL
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

enum Command {
    Quit,
    History,
    Clear,
    Rerun(usize),
    Ask(String),
}

fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    match input {
        "" => None,
        ":quit" | ":q" | ":exit" => Some(Command::Quit),
        ":history" => Some(Command::History),
        ":clear" => Some(Command::Clear),
        _ => match input.strip_prefix(":rerun") {
            Some(number) => number.trim().parse().ok().map(Command::Rerun),
            None => Some(Command::Ask(input.to_string())),
        },
    }
}

fn print_banner() {
    println!("AI-Powered SQL Query Assistant");
    println!("Ask a question in plain English, review the generated SQL, then run it.");
    println!();
    println!("Try asking:");
    for question in EXAMPLE_QUESTIONS {
        println!("  - {}", question);
    }
    println!();
    println!("Commands: :history, :rerun N, :clear, :quit");
    println!();
}

fn print_history(history: &QueryHistory) {
    if history.is_empty() {
        println!("No queries run yet.");
        return;
    }
    println!("Query History:");
    for entry in history.recent() {
        println!("Query {}: {}", entry.number, entry.title());
        println!("  {}", entry.sql.replace('\n', "\n  "));
        println!("  Returned {} rows", entry.rows);
    }
}

async fn run_and_show(client: &mut Client, sql: &str) -> Option<usize> {
    match run_read_only_query(client, sql).await {
        Ok(result) => {
            println!("✓ Query returned {} rows", result.row_count());
            println!("{}", result.render());
            Some(result.row_count())
        }
        Err(e) => {
            eprintln!("✗ {:#}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let secrets = Secrets::load(&cli.secrets)?;
    let config = AssistantConfig::from_secrets(&secrets)?;

    let llm = OpenAiClient::new(&config.openai_api_key, &cli.model)?;
    let mut client = postgres::connect(&config.target.connection_url())
        .await
        .context("Failed to connect to sales database")?;
    let schema = sales_schema();
    let mut history = QueryHistory::new();
    let theme = ColorfulTheme::default();

    print_banner();

    loop {
        let input: String = Input::with_theme(&theme)
            .with_prompt("What would you like to know?")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;

        let command = match parse_command(&input) {
            Some(command) => command,
            None => continue,
        };

        match command {
            Command::Quit => break,
            Command::History => print_history(&history),
            Command::Clear => {
                history.clear();
                println!("History cleared.");
            }
            Command::Rerun(number) => match history.get(number) {
                Some(entry) => {
                    let sql = entry.sql.clone();
                    run_and_show(&mut client, &sql).await;
                }
                None => eprintln!("✗ No query number {} in history", number),
            },
            Command::Ask(question) => {
                println!("Generating SQL with {}...", llm.model());
                let sql = match llm.generate_sql(&schema, &question).await {
                    Ok(sql) => sql,
                    Err(e) => {
                        eprintln!("✗ {:#}", e);
                        continue;
                    }
                };

                println!("\n{}\n", sql);
                let wants_edit = Confirm::with_theme(&theme)
                    .with_prompt("Edit the SQL before running?")
                    .default(false)
                    .interact()
                    .context("Failed to get confirmation")?;
                let edited = if wants_edit {
                    let saved = Editor::new()
                        .extension(".sql")
                        .edit(&sql)
                        .context("Failed to open editor")?;
                    let edited = reviewed_sql(sql, saved);
                    println!("\n{}\n", edited);
                    edited
                } else {
                    sql
                };

                let run = Confirm::with_theme(&theme)
                    .with_prompt("Run this query?")
                    .default(true)
                    .interact()
                    .context("Failed to get confirmation")?;
                if !run {
                    continue;
                }

                if let Some(rows) = run_and_show(&mut client, &edited).await {
                    history.record(&question, &edited, rows);
                }
            }
        }
    }

    Ok(())
}

/// The SQL to run after an editor session; unsaved or blank edits keep the generated query
fn reviewed_sql(generated: String, saved: Option<String>) -> String {
    match saved {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => generated,
    }
}
