//! Line REPL
//!
//! Reads prompts and slash commands from stdin. Sessions run on their own
//! tasks so the prompt stays responsive while a reply streams; view updates
//! are printed by a separate renderer task.

use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;

use murmur_core::backend::ChatBackend;
use murmur_core::{
    ChatError, ChatResult, Conductor, JsonConversationStore, MessageRole, SessionOutcome,
    SessionReport, ViewUpdate,
};

use crate::view::TerminalView;

const HELP: &str = "\
Type a message to chat. Commands:
  /models          list installed models
  /model <name>    switch model
  /new             start a new conversation
  /list            list conversations
  /switch <n>      open conversation n from /list
  /regen           answer the last prompt again
  /edit <text>     replace the last prompt and answer again
  /delete          delete the current conversation
  /help            show this help
  /quit            exit
Ctrl-C cancels a streaming reply.";

/// One line of input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    /// Plain prompt
    Prompt(String),
    Models,
    Model(String),
    New,
    List,
    Switch(usize),
    Regenerate,
    Edit(String),
    Delete,
    Help,
    Quit,
    /// Blank line
    Empty,
    /// Unknown or malformed command, with a hint
    Invalid(String),
}

/// Parse one input line
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Prompt(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg.is_empty()) {
        ("models", _) => ReplCommand::Models,
        ("model", false) => ReplCommand::Model(arg.to_string()),
        ("model", true) => ReplCommand::Invalid("usage: /model <name>".into()),
        ("new", _) => ReplCommand::New,
        ("list", _) => ReplCommand::List,
        ("switch", _) => match arg.parse::<usize>() {
            Ok(n) if n > 0 => ReplCommand::Switch(n),
            _ => ReplCommand::Invalid("usage: /switch <n>".into()),
        },
        ("regen" | "regenerate", _) => ReplCommand::Regenerate,
        ("edit", false) => ReplCommand::Edit(arg.to_string()),
        ("edit", true) => ReplCommand::Invalid("usage: /edit <text>".into()),
        ("delete", _) => ReplCommand::Delete,
        ("help" | "?", _) => ReplCommand::Help,
        ("quit" | "exit" | "q", _) => ReplCommand::Quit,
        _ => ReplCommand::Invalid(format!("unknown command /{name}, try /help")),
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Interactive chat loop
pub struct Repl<B: ChatBackend + 'static> {
    conductor: Conductor<B>,
    store: Option<JsonConversationStore>,
    width: usize,
    styled: bool,
}

impl<B: ChatBackend + 'static> Repl<B> {
    /// Create a REPL driving `conductor`
    pub fn new(
        conductor: Conductor<B>,
        store: Option<JsonConversationStore>,
        width: usize,
        styled: bool,
    ) -> Self {
        Self {
            conductor,
            store,
            width,
            styled,
        }
    }

    fn view(&self) -> TerminalView {
        TerminalView::new(self.width, self.styled)
    }

    /// Run until `/quit`, end of input, or Ctrl-C while idle
    pub async fn run(self, updates: mpsc::Receiver<ViewUpdate>) -> Result<()> {
        let renderer = tokio::spawn(render_updates(updates, self.view()));

        if self.conductor.active_conversation().is_none() {
            self.conductor.new_conversation().await;
        }
        if let Some(conversation) = self.conductor.active_conversation() {
            if !conversation.messages.is_empty() {
                print!("{}", self.view().transcript(&conversation));
            }
        }
        println!("{}", HELP.lines().next().unwrap_or_default());

        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

        loop {
            tokio::select! {
                line = lines.next() => {
                    let line = match line {
                        Some(line) => line?,
                        None => break,
                    };
                    if let Flow::Quit = self.handle(parse_command(&line)).await {
                        break;
                    }
                }

                result = tokio::signal::ctrl_c() => {
                    result?;
                    if !self.cancel_active().await {
                        break;
                    }
                }
            }
        }

        if let Some(session) = self.conductor.active_session() {
            self.conductor.cancel(&session.conversation_id).await;
        }
        renderer.abort();
        Ok(())
    }

    /// Cancel the streaming reply, if any
    async fn cancel_active(&self) -> bool {
        let Some(session) = self.conductor.active_session() else {
            return false;
        };
        tracing::info!(conversation = %session.conversation_id, "Cancelling on Ctrl-C");
        self.conductor.cancel(&session.conversation_id).await
    }

    async fn handle(&self, command: ReplCommand) -> Flow {
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Prompt(text) => self.submit(text),
            ReplCommand::Models => match self.conductor.list_models().await {
                Ok(models) => {
                    let selected = self.conductor.model();
                    print!("{}", self.view().model_list(&models, selected.as_deref()));
                }
                Err(e) => eprintln!("Could not list models: {e}"),
            },
            ReplCommand::Model(name) => {
                match self.conductor.backend().has_model(&name).await {
                    Ok(false) => eprintln!("Note: {name} is not installed on the server"),
                    Err(e) => tracing::debug!(error = %e, "Model check failed"),
                    Ok(true) => {}
                }
                self.conductor.select_model(&name);
                println!("Using {name}");
            }
            ReplCommand::New => {
                self.conductor.new_conversation().await;
                println!("New conversation");
            }
            ReplCommand::List => {
                print!("{}", self.view().conversation_list(&self.conductor.conversations()));
            }
            ReplCommand::Switch(n) => self.switch(n).await,
            ReplCommand::Regenerate => self.regenerate(),
            ReplCommand::Edit(text) => self.edit(text),
            ReplCommand::Delete => self.delete().await,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => return Flow::Quit,
            ReplCommand::Invalid(hint) => eprintln!("{hint}"),
        }
        if let Err(e) = std::io::stdout().flush() {
            tracing::debug!("Failed to flush stdout: {}", e);
        }
        Flow::Continue
    }

    fn submit(&self, text: String) {
        let Some(conversation) = self.conductor.active_conversation() else {
            eprintln!("No active conversation, try /new");
            return;
        };
        let conductor = self.conductor.clone();
        tokio::spawn(async move {
            report(conductor.submit(&conversation.id, text).await);
        });
    }

    fn regenerate(&self) {
        let Some(conversation) = self.conductor.active_conversation() else {
            eprintln!("No active conversation");
            return;
        };
        let Some(reply) = conversation
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
        else {
            eprintln!("Nothing to regenerate yet");
            return;
        };
        let reply_id = reply.id.clone();
        let conductor = self.conductor.clone();
        tokio::spawn(async move {
            report(conductor.regenerate(&conversation.id, &reply_id).await);
        });
    }

    fn edit(&self, text: String) {
        let Some(conversation) = self.conductor.active_conversation() else {
            eprintln!("No active conversation");
            return;
        };
        let Some(prompt) = conversation.last_user_message() else {
            eprintln!("Nothing to edit yet");
            return;
        };
        let prompt_id = prompt.id.clone();
        let conductor = self.conductor.clone();
        tokio::spawn(async move {
            report(
                conductor
                    .edit_and_resubmit(&conversation.id, &prompt_id, text)
                    .await,
            );
        });
    }

    async fn switch(&self, n: usize) {
        let conversations = self.conductor.conversations();
        let Some(summary) = conversations.get(n - 1) else {
            eprintln!("No conversation {n}, see /list");
            return;
        };
        if let Err(e) = self.conductor.set_active(&summary.id).await {
            eprintln!("{e}");
            return;
        }
        if let Some(conversation) = self.conductor.conversation(&summary.id) {
            print!("{}", self.view().transcript(&conversation));
        }
    }

    async fn delete(&self) {
        let Some(conversation) = self.conductor.active_conversation() else {
            return;
        };
        match self.conductor.delete_conversation(&conversation.id).await {
            Ok(removed) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.delete(&removed.id).await {
                        tracing::warn!(conversation = %removed.id, error = %e, "Failed to delete stored conversation");
                    }
                }
                println!("Deleted \"{}\"", removed.title);
                if self.conductor.active_conversation().is_none() {
                    self.conductor.new_conversation().await;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// Print what the user needs to know about a finished session
fn report(result: ChatResult<SessionReport>) {
    match result {
        Ok(SessionReport {
            outcome: SessionOutcome::Rejected,
            ..
        }) => eprintln!("Still answering, wait or press Ctrl-C"),
        Ok(_) => {}
        Err(ChatError::NoModelSelected) => {
            eprintln!("No model selected, pick one with /model <name> (see /models)");
        }
        Err(e) => eprintln!("{e}"),
    }
}

async fn render_updates(mut updates: mpsc::Receiver<ViewUpdate>, mut view: TerminalView) {
    let mut stdout = std::io::stdout();
    while let Some(update) = updates.recv().await {
        let text = view.apply(&update);
        if text.is_empty() {
            continue;
        }
        if stdout
            .write_all(text.as_bytes())
            .and_then(|()| stdout.flush())
            .is_err()
        {
            break;
        }
    }
}
