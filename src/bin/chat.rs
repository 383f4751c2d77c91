//! FlowCloser terminal chat
//!
//! Talks to the agent directly, without the HTTP server, on the terminal
//! channel.

use std::io::Write;
use std::process;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use flowcloser_lib::agents::{ConversationTurn, FlowCloser};
use flowcloser_lib::channels::Channel;
use flowcloser_lib::config::AppConfig;

const TERMINAL_USER: &str = "terminal-user";

#[derive(Parser)]
#[command(name = "flowcloser-chat")]
#[command(about = "Chat with FlowCloser from the terminal")]
#[command(version)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// What one line of input asks the REPL to do
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Clear,
    Help,
    Empty,
    Message(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => Command::Empty,
        "sair" | "exit" => Command::Exit,
        "clear" | "limpar" => Command::Clear,
        "help" | "ajuda" => Command::Help,
        _ => Command::Message(trimmed),
    }
}

fn new_session_id() -> String {
    format!("terminal-{}", uuid::Uuid::new_v4())
}

fn print_help() {
    println!("Comandos:");
    println!("  sair | exit     - encerrar");
    println!("  limpar | clear  - iniciar nova sessão");
    println!("  ajuda | help    - mostrar esta ajuda");
    println!();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Quiet by default so log lines don't interleave with the conversation
    let filter = if args.verbose {
        "flowcloser_lib=debug"
    } else {
        "flowcloser_lib=warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        eprintln!("Erro: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let closer = FlowCloser::from_config(&config)?;

    println!("FlowCloser - chat no terminal");
    println!("Modelos: {} (fallback: {})", closer.primary_id(), closer.fallback_id());
    print_help();

    let mut session_id = new_session_id();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("você> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Exit => break,
            Command::Help => print_help(),
            Command::Clear => {
                session_id = new_session_id();
                println!("Nova sessão: {}\n", session_id);
            }
            Command::Message(text) => {
                let turn = ConversationTurn::new(text, Channel::Terminal, TERMINAL_USER)
                    .with_session(session_id.clone());
                match closer.ask(&turn).await {
                    Ok(result) => {
                        println!("\nflowcloser> {}", result.final_text);
                        if result.fallback_used {
                            println!("  (resposta do fallback: {})", result.backend);
                        }
                        println!();
                    }
                    Err(e) => eprintln!("\nErro: {}\n", e),
                }
            }
        }
    }

    println!("Até logo!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("SAIR"), Command::Exit);
        assert_eq!(parse_command("exit\n"), Command::Exit);
        assert_eq!(parse_command("limpar"), Command::Clear);
        assert_eq!(parse_command("ajuda"), Command::Help);
        assert_eq!(parse_command("  Oi, tudo bem? "), Command::Message("Oi, tudo bem?"));
    }

    #[test]
    fn test_new_session_ids_differ() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
