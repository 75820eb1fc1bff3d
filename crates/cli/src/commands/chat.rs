//! Chat command handler.
//!
//! A line-oriented REPL over stdin. Plain lines are questions answered
//! within the current session; lines starting with `/` are commands.

use super::format_sources;
use crate::wiring;
use clap::Args;
use docqa_agents::{ConversationalAnswer, QaService};
use docqa_core::{config::AppConfig, AppError, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /new  /history  /clear  /sessions  /quit";

/// Conversational session with verified answers
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Resume (or start) the session with this id
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the retrieved sources under each answer
    #[arg(long)]
    pub sources: bool,
}

/// A parsed REPL line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    New,
    History,
    Clear,
    Sessions,
    Quit,
    Help,
    Unknown(&'a str),
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line);
    };

    match command.trim().to_ascii_lowercase().as_str() {
        "new" => Input::New,
        "history" => Input::History,
        "clear" => Input::Clear,
        "sessions" => Input::Sessions,
        "quit" | "exit" | "q" => Input::Quit,
        "help" | "?" => Input::Help,
        _ => Input::Unknown(line),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let service = wiring::qa_service(config)?;
        let mut session_id = self.session.clone();

        println!("DocQA chat. {}", HELP);
        if let Some(id) = &session_id {
            println!("Session: {}", id);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_input(&line) {
                Input::Blank => {}
                Input::Quit => break,
                Input::Help => println!("{}", HELP),
                Input::Unknown(cmd) => println!("Unknown command {}. {}", cmd, HELP),
                Input::New => {
                    let id = service.new_session();
                    println!("Started session {}", id);
                    session_id = Some(id);
                }
                Input::History => match &session_id {
                    Some(id) => self.print_history(&service, id),
                    None => println!("No session yet. Ask a question first."),
                },
                Input::Clear => match &session_id {
                    Some(id) => match service.clear_session(id) {
                        Ok(()) => println!("Cleared session {}", id),
                        Err(e) => eprintln!("Error: {}", e),
                    },
                    None => println!("No session yet."),
                },
                Input::Sessions => print_sessions(&service, session_id.as_deref()),
                Input::Question(question) => {
                    let removed = service.sessions().cleanup_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Removed idle sessions");
                    }

                    match service
                        .answer_conversational(question, session_id.as_deref())
                        .await
                    {
                        Ok(answer) => {
                            self.print_answer(&answer);
                            session_id = Some(answer.session_id);
                        }
                        Err(e) => {
                            tracing::error!("Question failed: {}", e);
                            eprintln!("Error: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn print_answer(&self, answer: &ConversationalAnswer) {
        println!("{}", answer.final_answer);

        let verdict = answer
            .verdict
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unverified".to_string());
        println!("  [turn {} | {}]", answer.turn_number, verdict);

        if self.sources && !answer.fragments_used.is_empty() {
            println!("{}", format_sources(&answer.fragments_used));
        }
    }

    fn print_history(&self, service: &QaService, session_id: &str) {
        let history = match service.get_history(session_id) {
            Ok(history) => history,
            Err(AppError::SessionNotFound(_)) => {
                println!("Session {} has no history.", session_id);
                return;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return;
            }
        };

        if history.turns.is_empty() {
            println!("Session {} is empty.", session_id);
            return;
        }

        for turn in &history.turns {
            println!("Turn {} ({})", turn.index, turn.timestamp.format("%H:%M:%S"));
            println!("  Q: {}", turn.question);
            println!("  A: {}", turn.answer);
        }
    }
}

fn print_sessions(service: &QaService, current: Option<&str>) {
    let sessions = service.list_sessions();
    if sessions.is_empty() {
        println!("No sessions.");
        return;
    }

    for summary in sessions {
        let marker = if current == Some(summary.session_id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {} turns  last active {}",
            marker,
            summary.session_id,
            summary.turn_count,
            summary.last_activity.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions() {
        assert_eq!(parse_input("  What is HNSW? "), Input::Question("What is HNSW?"));
        assert_eq!(parse_input("   "), Input::Blank);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/new"), Input::New);
        assert_eq!(parse_input("/HISTORY"), Input::History);
        assert_eq!(parse_input("/clear"), Input::Clear);
        assert_eq!(parse_input("/sessions"), Input::Sessions);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/?"), Input::Help);
        assert_eq!(parse_input("/delete"), Input::Unknown("/delete"));
    }
}
