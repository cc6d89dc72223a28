use super::ui;
use crate::core::store::{self, SessionStore};
use crate::core::turn::{Presence, reset_conversation, run_turn};
use crate::math::{Evaluator, LineResult};
use anyhow::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Type one expression per line, several lines are evaluated in order.
  x = 3 * 4          bind a variable
  f(x) = x ^ 2       define a function
  8 EUR to USD       convert between units and currencies
  N or /N            evaluate pad entry N again
Commands:
  /vars              list variables
  /pad               list evaluated expressions
  /functions         list available functions
  /clear, /reset     forget variables and the pad
  /help              show this help
  /quit              leave";

/// Shows a spinner from the typing notification until the turn is rendered.
#[derive(Default)]
pub struct SpinnerPresence {
    spinner: Mutex<Option<ProgressBar>>,
}

impl SpinnerPresence {
    pub fn finish(&self) {
        let mut spinner = self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(spinner) = spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

#[async_trait]
impl Presence for SpinnerPresence {
    async fn typing(&self, _conversation_id: &str) -> Result<()> {
        let mut spinner = self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        spinner.get_or_insert_with(|| ui::new_spinner("Calculating..."));
        Ok(())
    }
}

#[derive(Debug)]
pub enum Reply {
    Results(Vec<LineResult>),
    Text(String),
    Quit,
}

pub struct Repl<'a> {
    pub store: &'a dyn SessionStore,
    pub evaluator: &'a Evaluator,
    pub conversation_id: &'a str,
}

impl Repl<'_> {
    /// Handles one line of user input: a slash command or expressions.
    pub async fn handle(&self, input: &str, presence: &dyn Presence) -> Result<Reply> {
        let command = input.trim();
        let reply = match command {
            "/quit" | "/exit" => Reply::Quit,
            "/help" | "/start" => Reply::Text(HELP.to_string()),
            "/clear" | "/reset" => {
                let previous = reset_conversation(self.store, self.conversation_id).await?;
                Reply::Text(format!(
                    "Cleared {} variables and {} pad entries",
                    previous.scope.len(),
                    previous.pad.len()
                ))
            }
            "/vars" => {
                let session = store::load(self.store, self.conversation_id).await?;
                if session.scope.is_empty() {
                    Reply::Text("No variables defined".to_string())
                } else {
                    Reply::Text(ui::scope_table(&session, self.evaluator).to_string())
                }
            }
            "/pad" | "/history" => {
                let session = store::load(self.store, self.conversation_id).await?;
                if session.pad.is_empty() {
                    Reply::Text("The pad is empty".to_string())
                } else {
                    Reply::Text(ui::pad_table(&session).to_string())
                }
            }
            "/functions" => Reply::Text(self.evaluator.engine().functions().enabled().join(", ")),
            _ if command.starts_with('/') && !command[1..].bytes().all(|b| b.is_ascii_digit()) => {
                Reply::Text(format!("Unknown command {command}, try /help"))
            }
            _ => Reply::Results(
                run_turn(
                    self.store,
                    self.evaluator,
                    presence,
                    self.conversation_id,
                    input,
                )
                .await?,
            ),
        };
        Ok(reply)
    }
}

pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Results(results) => results
            .iter()
            .map(ui::render_line_result)
            .collect::<Vec<_>>()
            .join("\n"),
        Reply::Text(text) => text.clone(),
        Reply::Quit => String::new(),
    }
}

/// Interactive loop over stdin until EOF or `/quit`.
pub async fn run(repl: Repl<'_>) -> Result<()> {
    println!(
        "{} {}",
        ui::style_text("mathpad", ui::StyleType::Title),
        ui::style_text("(/help for commands)", ui::StyleType::Subtle)
    );
    let presence = SpinnerPresence::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = repl.handle(&line, &presence).await;
        presence.finish();
        match reply {
            Ok(Reply::Quit) => break,
            Ok(reply) => println!("{}", render(&reply)),
            Err(e) => println!("{}", ui::style_text(&format!("{e:#}"), ui::StyleType::Error)),
        }
    }
    debug!("Leaving repl");
    Ok(())
}

/// Evaluates `expressions` as one turn and prints the results.
pub async fn eval_once(repl: Repl<'_>, expressions: &[String]) -> Result<()> {
    let input = expressions.join("\n");
    let presence = crate::core::turn::NoPresence;
    let reply = repl.handle(&input, &presence).await?;
    println!("{}", render(&reply));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::UnitRegistry;
    use crate::core::turn::NoPresence;
    use crate::math::format::NumberFormat;
    use crate::math::MathEngine;
    use crate::math::functions::FunctionTable;
    use crate::store::memory::MemorySessionStore;
    use std::sync::Arc;

    fn evaluator() -> Evaluator {
        Evaluator::new(MathEngine::new(
            Arc::new(UnitRegistry::default()),
            FunctionTable::standard(),
            NumberFormat::default(),
        ))
    }

    #[tokio::test]
    async fn test_commands_and_expressions() {
        let store = MemorySessionStore::new();
        let evaluator = evaluator();
        let repl = Repl {
            store: &store,
            evaluator: &evaluator,
            conversation_id: "cli",
        };

        let reply = repl.handle("a = 2\na * 21", &NoPresence).await.unwrap();
        let rendered = console::strip_ansi_codes(&render(&reply)).to_string();
        assert_eq!(rendered, "[0] a = 2 => 2\n[1] a * 21 => 42");

        let reply = repl.handle("/1", &NoPresence).await.unwrap();
        assert!(matches!(&reply, Reply::Results(r) if r.len() == 1 && r[0].is_success()));

        let Reply::Text(vars) = repl.handle("/vars", &NoPresence).await.unwrap() else {
            panic!("expected text");
        };
        assert!(vars.contains('a'));

        let Reply::Text(cleared) = repl.handle("/reset", &NoPresence).await.unwrap() else {
            panic!("expected text");
        };
        assert_eq!(cleared, "Cleared 1 variables and 2 pad entries");

        let Reply::Text(pad) = repl.handle("/pad", &NoPresence).await.unwrap() else {
            panic!("expected text");
        };
        assert_eq!(pad, "The pad is empty");

        assert!(matches!(
            repl.handle("/quit", &NoPresence).await.unwrap(),
            Reply::Quit
        ));
        assert!(matches!(
            repl.handle("/bogus", &NoPresence).await.unwrap(),
            Reply::Text(t) if t.starts_with("Unknown command")
        ));
    }

    #[tokio::test]
    async fn test_spinner_presence_can_be_finished_twice() {
        let presence = SpinnerPresence::default();
        presence.typing("cli").await.unwrap();
        presence.finish();
        presence.finish();
    }
}
