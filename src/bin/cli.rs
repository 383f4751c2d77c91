//! FlowCloser Doctor
//!
//! Connectivity checks for the hosted services FlowCloser depends on, plus a
//! one-shot `ask` that runs a full dispatch from the command line.

use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};

use flowcloser_lib::agents::{ConversationTurn, FlowCloser};
use flowcloser_lib::ai::{
    ChatMessage, GeminiClient, ModelRequest, OpenAIClient, Provider, ProviderKind,
};
use flowcloser_lib::channels::Channel;
use flowcloser_lib::config::settings::DEFAULT_FALLBACK_MODEL;
use flowcloser_lib::config::AppConfig;
use flowcloser_lib::utils::{mask_secret, truncate_chars};

const IQAI_INFO_PATHS: [&str; 3] = ["/api/agents/info", "/api/agent/info", "/api/agents"];

#[derive(Parser)]
#[command(name = "flowcloser-doctor")]
#[command(about = "FlowCloser connectivity diagnostics")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List OpenAI models visible to the configured key
    Openai,

    /// Send one generateContent ping to Gemini
    Gemini {
        /// Model to ping (defaults to the configured fallback when it is a Gemini model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Probe the IQAI agent info endpoints
    Iqai,

    /// Run one full dispatch through primary and fallback
    Ask {
        /// Message to send
        message: String,

        /// Channel the message arrives on
        #[arg(short, long, default_value = "api")]
        channel: String,

        /// User id for the session
        #[arg(short, long, default_value = "doctor")]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("flowcloser_lib=debug,flowcloser_doctor=debug")
            .init();
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    match run_command(cli.command, &config).await {
        Ok(_) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run_command(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Openai => check_openai(config).await,
        Commands::Gemini { model } => check_gemini(config, model).await,
        Commands::Iqai => check_iqai(config).await,
        Commands::Ask {
            message,
            channel,
            user,
        } => ask(config, &message, &channel, &user).await,
    }
}

async fn check_openai(config: &AppConfig) -> anyhow::Result<()> {
    let creds = &config.credentials;
    let key = creds
        .openai_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;

    println!("OpenAI");
    println!("  Base URL: {}", creds.openai_base_url);
    println!("  Key:      {}", mask_secret(key, 4));
    if let Some(org) = &creds.openai_org_id {
        println!("  Org:      {}", org);
    }
    if let Some(project) = &creds.openai_project_id {
        println!("  Project:  {}", project);
    }

    let client = OpenAIClient::new(key, &config.models.primary, Some(&creds.openai_base_url))?
        .with_organization(creds.openai_org_id.clone(), creds.openai_project_id.clone());

    let models = client.list_models().await?;
    println!("  {} models available", models.len());

    let wanted = &config.models.primary;
    if ProviderKind::for_model(wanted) == ProviderKind::OpenAI {
        if models.iter().any(|m| m == wanted) {
            println!("  LLM_MODEL '{}' is available", wanted);
        } else {
            println!("  LLM_MODEL '{}' is NOT in the model list", wanted);
        }
    }
    Ok(())
}

async fn check_gemini(config: &AppConfig, model: Option<String>) -> anyhow::Result<()> {
    let key = config
        .credentials
        .google_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GOOGLE_API_KEY is not set"))?;

    let model = model.unwrap_or_else(|| {
        if ProviderKind::for_model(&config.models.fallback) == ProviderKind::Gemini {
            config.models.fallback.clone()
        } else {
            DEFAULT_FALLBACK_MODEL.to_string()
        }
    });

    println!("Gemini");
    println!("  Model: {}", model);
    println!("  Key:   {}", mask_secret(key, 4));

    let client = GeminiClient::new(key, &model)?;
    let request = ModelRequest {
        messages: vec![ChatMessage::user("ping")],
        ..Default::default()
    };

    let started = Instant::now();
    let reply = client.generate(&request).await?;
    println!(
        "  Reply in {} ms: {}",
        started.elapsed().as_millis(),
        truncate_chars(reply.text.trim(), 80)
    );
    Ok(())
}

async fn check_iqai(config: &AppConfig) -> anyhow::Result<()> {
    let iqai = &config.iqai;
    let key = iqai
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("IQAI_API_KEY is not set"))?;

    println!("IQAI");
    println!("  Base URL: {}", iqai.base_url);
    println!("  Agent:    {}", iqai.agent_token_contract);

    let client = reqwest::Client::new();
    let base = iqai.base_url.trim_end_matches('/');

    for path in IQAI_INFO_PATHS {
        let url = url::Url::parse_with_params(
            &format!("{}{}", base, path),
            &[("address", iqai.agent_token_contract.as_str())],
        )?;
        println!("  Trying {}", url);

        let response = match client.get(url).bearer_auth(key).send().await {
            Ok(r) => r,
            Err(e) => {
                println!("    Error: {}", e);
                continue;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            println!("    {} OK: {}", status, truncate_chars(&body, 300));
            return Ok(());
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            anyhow::bail!("authentication failed ({}), check IQAI_API_KEY", status);
        }
        println!("    {}: {}", status, truncate_chars(&body, 100));
    }

    anyhow::bail!("no IQAI info endpoint answered successfully")
}

async fn ask(config: &AppConfig, message: &str, channel: &str, user: &str) -> anyhow::Result<()> {
    let channel = Channel::from_str(channel)
        .ok_or_else(|| anyhow::anyhow!("unknown channel '{}'", channel))?;
    let closer = FlowCloser::from_config(config)?;

    let turn = ConversationTurn::new(message, channel, user);
    let started = Instant::now();
    let result = closer.ask(&turn).await?;

    println!("Backend:  {}", result.backend);
    println!("Fallback: {}", result.fallback_used);
    if let Some(reason) = result.escalation {
        println!("Escalated: {}", reason.as_str());
    }
    println!("Latency:  {} ms", started.elapsed().as_millis());
    println!();
    println!("{}", result.final_text);
    Ok(())
}
