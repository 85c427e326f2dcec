//! Command-line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use sahayak_core::Settings;
use std::io::{BufRead, Write};

use crate::setup;

/// Conversational banking assistant
#[derive(Parser)]
#[command(name = "sahayak", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,
        /// Reuse an existing session id
        #[arg(long)]
        session: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop sharing one session
    Repl,
    /// Print provider health and manager statistics
    Health,
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Command::Ask {
            question,
            session,
            json,
        } => {
            let (agent, _manager) = setup::build_agent(&settings)?;
            let response = agent.query(&question, session, Vec::new()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.answer);
                if !response.sources.is_empty() {
                    println!("\nSources: {}", response.sources.join(", "));
                }
            }
        }
        Command::Repl => {
            let (agent, _manager) = setup::build_agent(&settings)?;
            let mut history = Vec::new();
            let mut session_id: Option<String> = None;
            let stdin = std::io::stdin();

            println!("sahayak - type a question, or 'exit' to quit");
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") {
                    break;
                }

                let response = agent
                    .query(question, session_id.clone(), std::mem::take(&mut history))
                    .await;
                println!("\n{}\n", response.answer);
                session_id = Some(response.session_id.clone());
                history = response.chat_history;
            }
        }
        Command::Health => {
            let (_agent, manager) = setup::build_agent(&settings)?;
            let health = manager.get_health_stats();
            let stats = manager.get_manager_stats();
            println!("{}", serde_json::to_string_pretty(&health)?);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
