//! Inkwell CLI - Command-line client for the generation gateway

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8787";
const API_PREFIX: &str = "/api/generation";

#[derive(Parser)]
#[command(name = "inkwell")]
#[command(about = "Inkwell Generation Orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gateway base URL
    #[arg(long, env = "INKWELL_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a generation job
    Generate {
        /// Action name (e.g., generate-chapter, suggest-titles)
        #[arg(short, long)]
        action: String,

        /// Agent the request is addressed to
        #[arg(short = 't', long)]
        agent_target: Option<String>,

        /// Project context as a JSON object
        #[arg(short, long)]
        context: Option<String>,

        /// Action-specific payload as JSON
        #[arg(short, long)]
        payload: Option<String>,

        /// Stream output to stdout as it arrives
        #[arg(short, long)]
        follow: bool,
    },

    /// Attach to a job's output stream
    Stream {
        /// Job ID
        id: String,
    },

    /// Show a job snapshot
    Show {
        /// Job ID
        id: String,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        id: String,
    },

    /// Show authentication status
    Status {
        /// Force a status (only honored when the daemon allows overrides)
        #[arg(long, value_parser = ["authenticated", "unauthenticated"])]
        force: Option<String>,
    },

    /// Run a consistency check on a piece of text
    Check {
        /// Text to check
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        content: Option<String>,

        /// Read the text from a file instead
        #[arg(long)]
        file: Option<PathBuf>,

        /// Project context as a JSON object
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Check that the daemon is up
    Health,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    id: String,
    state: String,
    action: String,
    agent_target: Option<String>,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    exit_reason: Option<String>,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "ACTION")]
    action: String,
    #[tabled(rename = "AGENT")]
    agent: String,
    #[tabled(rename = "DURATION")]
    duration: String,
    #[tabled(rename = "EXIT")]
    exit: String,
}

impl From<JobView> for JobRow {
    fn from(job: JobView) -> Self {
        let duration = match (job.started_at, job.finished_at) {
            (Some(start), Some(end)) => format!("{:.1}s", (end - start) as f64 / 1000.0),
            (Some(_), None) => "running".to_string(),
            _ => "-".to_string(),
        };
        Self {
            id: job.id,
            state: job.state,
            action: job.action,
            agent: job.agent_target.unwrap_or_else(|| "-".to_string()),
            duration,
            exit: job.exit_reason.unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Thin client over the gateway routes
struct Gateway {
    base: String,
    http: reqwest::Client,
}

impl Gateway {
    fn new(url: &str) -> Self {
        Self {
            base: url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base, API_PREFIX, path)
    }

    async fn get(&self, url: String) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to connect to daemon")?;
        read_json(response).await
    }

    async fn post(&self, url: String, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to connect to daemon")?;
        read_json(response).await
    }

    async fn job(&self, id: &str) -> Result<JobView> {
        let value = self.get(self.url(&format!("/generations/{id}"))).await?;
        serde_json::from_value(value).context("Unexpected job snapshot")
    }

    /// Copy the job's output to `out` until the stream ends
    async fn stream_to<W: Write>(&self, id: &str, out: &mut W) -> Result<usize> {
        let mut response = self
            .http
            .get(self.url(&format!("/stream/{id}")))
            .send()
            .await
            .context("Failed to connect to daemon")?;
        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let mut total = 0;
        while let Some(chunk) = response.chunk().await.context("Stream interrupted")? {
            out.write_all(&chunk)?;
            out.flush()?;
            total += chunk.len();
        }
        Ok(total)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse response ({status})"))?;

    if !status.is_success() {
        return Err(api_error(status, &body));
    }
    Ok(body)
}

fn api_error(status: StatusCode, body: &Value) -> anyhow::Error {
    let message = body["error"].as_str().unwrap_or("request failed");
    let code = body["code"].as_str().unwrap_or("UNKNOWN");
    let mut text = format!("{} {}: {}", status.as_u16(), code, message);
    if let Some(details) = body["details"].as_array() {
        for detail in details.iter().filter_map(Value::as_str) {
            text.push_str("\n  - ");
            text.push_str(detail);
        }
    }
    anyhow::anyhow!(text)
}

fn parse_json_arg(name: &str, raw: Option<String>) -> Result<Option<Value>> {
    raw.map(|raw| serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in --{name}")))
        .transpose()
}

fn generate_body(
    action: String,
    agent_target: Option<String>,
    context: Option<String>,
    payload: Option<String>,
) -> Result<Value> {
    let mut body = json!({ "action": action });
    if let Some(agent) = agent_target {
        body["agentTarget"] = json!(agent);
    }
    if let Some(context) = parse_json_arg("context", context)? {
        body["context"] = context;
    }
    if let Some(payload) = parse_json_arg("payload", payload)? {
        body["payload"] = payload;
    }
    Ok(body)
}

/// Stream a job to stdout, then report how it ended on stderr
async fn follow(gateway: &Gateway, id: &str) -> Result<()> {
    let bytes = gateway.stream_to(id, &mut std::io::stdout()).await?;
    eprintln!();

    let job = gateway.job(id).await?;
    let line = format!("{} {} ({} bytes)", job.id, job.state, bytes);
    match job.state.as_str() {
        "completed" => eprintln!("{} {}", "✓".green(), line),
        "failed" => eprintln!(
            "{} {} [{}]",
            "✗".red(),
            line,
            job.exit_reason.as_deref().unwrap_or("unknown")
        ),
        "cancelled" => eprintln!("{} {}", "○".yellow(), line),
        _ => eprintln!("{} {}", "…".cyan(), line),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let gateway = Gateway::new(&cli.url);

    match cli.command {
        Commands::Generate {
            action,
            agent_target,
            context,
            payload,
            follow: follow_output,
        } => {
            let body = generate_body(action, agent_target, context, payload)?;
            let result = gateway.post(gateway.url("/generate"), &body).await?;
            let id = result["id"]
                .as_str()
                .context("No job id in response")?
                .to_string();

            if follow_output {
                eprintln!("{} {}", "Job started:".cyan().bold(), id);
                follow(&gateway, &id).await?;
            } else {
                println!("{}", "✓ Job accepted".green().bold());
                println!("  {} {}", "ID:".bold(), id);
                println!();
                println!("  Follow with: inkwell stream {}", id);
            }
        }

        Commands::Stream { id } => {
            follow(&gateway, &id).await?;
        }

        Commands::Show { id } => {
            let job = gateway.job(&id).await?;
            let table = Table::new(vec![JobRow::from(job)]).to_string();
            println!("{}", table);
        }

        Commands::Cancel { id } => {
            let result = gateway
                .post(gateway.url(&format!("/generations/{id}/cancel")), &json!({}))
                .await?;
            let state = result["state"].as_str().unwrap_or("unknown");
            if state == "cancelled" {
                println!("{}", format!("✓ Job {} cancelled", id).green().bold());
            } else {
                println!(
                    "{}",
                    format!("○ Job {} already finished ({})", id, state).yellow()
                );
            }
        }

        Commands::Status { force } => {
            let url = match force {
                Some(force) => format!("{}?force={}", gateway.url("/status"), force),
                None => gateway.url("/status"),
            };
            println!("{}", "Generation Status".cyan().bold());
            println!();

            match gateway.get(url).await {
                Ok(status) => {
                    let flag = |key: &str| {
                        if status[key].as_bool().unwrap_or(false) {
                            "yes".green()
                        } else {
                            "no".red()
                        }
                    };
                    println!("  {} {}", "Gateway:".bold(), cli.url);
                    println!("  {} {}", "Authenticated:".bold(), flag("authenticated"));
                    println!("  {} {}", "CLI authenticated:".bold(), flag("cliAuthenticated"));
                    println!("  {} {}", "Can use AI:".bold(), flag("canUseAI"));
                    println!();
                    println!("  {}", status["message"].as_str().unwrap_or_default());
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Check {
            content,
            file,
            context,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Either --content or --file is required"),
            };
            let mut body = json!({ "content": content });
            if let Some(context) = parse_json_arg("context", context)? {
                body["context"] = context;
            }

            let report = gateway
                .post(gateway.url("/consistency-check"), &body)
                .await?;
            let warnings = report["warnings"].as_array().cloned().unwrap_or_default();
            if warnings.is_empty() {
                println!("{}", "✓ No consistency warnings".green().bold());
            } else {
                println!(
                    "{}",
                    format!("{} consistency warning(s)", warnings.len()).yellow().bold()
                );
                for warning in warnings {
                    println!("  {} {}", "•".bold(), warning);
                }
            }
        }

        Commands::Health => {
            let response = gateway
                .http
                .get(format!("{}/health", gateway.base))
                .send()
                .await
                .context("Failed to connect to daemon")?;
            let health = read_json(response).await?;
            println!(
                "  {} {} (v{})",
                "Daemon:".bold(),
                "ONLINE".green(),
                health["version"].as_str().unwrap_or("?")
            );
        }
    }

    Ok(())
}
