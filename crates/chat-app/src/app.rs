use std::io::{self, Write};

use chatline_chat::{
    Affordance, ChatController, CopyTarget, Message, MessageId, Renderer, Update, code_blocks,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::render::{TerminalCodePresenter, TerminalRenderer};

const BANNER: &str = "chatline · type a prompt and press enter, /help for commands";

const HELP: &str = "\
commands:
  <text>               send a prompt
  /cancel <id>         cancel the call for a waiting turn
  /retry <id>          ask again for a completed reply
  /copy <id> [block]   copy a reply, or one of its code blocks
  /show                print the whole conversation
  /help                print this help
  /quit                cancel outstanding calls and exit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Cancel(MessageId),
    Retry(MessageId),
    Copy {
        id: MessageId,
        block: Option<usize>,
    },
    Show,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    /// Lines starting with `/` are commands, anything else is a prompt.
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.trim().strip_prefix('/') else {
            return Self::Submit(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args = parts.collect::<Vec<_>>();

        match (name, args.as_slice()) {
            ("cancel", [id]) => parse_id(id).map_or_else(|| invalid_id(id), Self::Cancel),
            ("retry", [id]) => parse_id(id).map_or_else(|| invalid_id(id), Self::Retry),
            ("copy", [id]) => {
                parse_id(id).map_or_else(|| invalid_id(id), |id| Self::Copy { id, block: None })
            }
            ("copy", [id, block]) => match (parse_id(id), block.parse::<usize>()) {
                (Some(id), Ok(block)) => Self::Copy {
                    id,
                    block: Some(block),
                },
                (None, _) => invalid_id(id),
                (Some(_), Err(_)) => Self::Invalid(format!("`{block}` is not a block number")),
            },
            ("show", []) => Self::Show,
            ("help", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => Self::Invalid(format!("unknown command `/{rest}`, try /help")),
        }
    }
}

fn parse_id(raw: &str) -> Option<MessageId> {
    raw.trim_start_matches('#')
        .parse::<u64>()
        .ok()
        .map(MessageId::new)
}

fn invalid_id(raw: &str) -> Command {
    Command::Invalid(format!("`{raw}` is not a message id"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented front-end over a [`ChatController`].
///
/// Input lines and controller updates are handled on the same task, so the transcript
/// never interleaves a half-applied state change.
pub struct ChatShell<W> {
    controller: ChatController,
    out: W,
}

impl<W: Write> ChatShell<W> {
    pub fn new(controller: ChatController, out: W) -> Self {
        Self { controller, out }
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ChatController {
        &mut self.controller
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Runs until `/quit` or end of input, then signals every outstanding call.
    pub async fn run<R>(&mut self, input: R) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(self.out, "{BANNER}")?;
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if self.handle_line(&line)? == Flow::Quit {
                        break;
                    }
                }
                update = self.controller.next_update() => self.handle_update(update)?,
            }
            self.out.flush()?;
        }

        let cancelled = self.controller.shutdown();
        tracing::info!(cancelled, "chat session closed");
        Ok(())
    }

    pub fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        match Command::parse(line) {
            Command::Submit(prompt) => {
                self.controller.set_input(prompt);
                if let Some(user_id) = self.controller.submit_input() {
                    self.print_turn(user_id)?;
                }
            }
            Command::Cancel(id) => {
                // Accept either side of the turn.
                let user_id = self
                    .controller
                    .ledger()
                    .get(id)
                    .and_then(|message| message.reply_to)
                    .unwrap_or(id);
                if self.controller.cancel(user_id) {
                    writeln!(self.out, "[{user_id}] cancelled")?;
                } else {
                    writeln!(self.out, "[{user_id}] has no call in flight")?;
                }
            }
            Command::Retry(id) => match self.controller.retry(id) {
                Some(user_id) => self.print_turn(user_id)?,
                None => writeln!(self.out, "[{id}] cannot be retried right now")?,
            },
            Command::Copy { id, block } => {
                let copied = match block {
                    Some(index) => self.controller.copy_code_block(id, index),
                    None => self.controller.copy_message(id),
                };
                match copied {
                    Ok(()) => writeln!(self.out, "[{id}] copied")?,
                    Err(error) => writeln!(self.out, "copy failed: {error}")?,
                }
            }
            Command::Show => self.print_transcript()?,
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Invalid(message) => writeln!(self.out, "{message}")?,
        }
        Ok(Flow::Continue)
    }

    pub fn handle_update(&mut self, update: Update) -> io::Result<()> {
        match update {
            Update::ReplyResolved { reply_id, .. } => {
                if let Some(reply) = self.controller.ledger().get(reply_id) {
                    let line = self.format_message(reply);
                    writeln!(self.out, "{line}")?;
                }
            }
            Update::CallCancelled { user_id } => {
                writeln!(self.out, "[{user_id}] call ended without a reply")?;
            }
            Update::ResolutionDiscarded { .. }
            | Update::CopyMarkCleared(_)
            | Update::Unchanged => {}
        }
        Ok(())
    }

    fn print_turn(&mut self, user_id: MessageId) -> io::Result<()> {
        let ledger = self.controller.ledger();
        let lines = ledger
            .get(user_id)
            .into_iter()
            .chain(ledger.reply_for(user_id))
            .map(|message| self.format_message(message))
            .collect::<Vec<_>>();

        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn print_transcript(&mut self) -> io::Result<()> {
        let lines = self
            .controller
            .ledger()
            .messages()
            .iter()
            .map(|message| self.format_message(message))
            .collect::<Vec<_>>();

        if lines.is_empty() {
            writeln!(self.out, "(no messages yet)")?;
        }
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn format_message(&self, message: &Message) -> String {
        let id = message.id;
        if message.is_user() {
            return format!("[{id}] you: {}", message.text);
        }

        match self.controller.affordance(id) {
            Affordance::Cancel { user_id } => {
                format!("[{id}] assistant: … waiting for a reply (/cancel {user_id})")
            }
            _ if message.is_placeholder() => format!("[{id}] assistant: …"),
            _ => {
                let copied_blocks = (0..code_blocks(&message.text).len())
                    .filter(|index| self.controller.is_copied(id, CopyTarget::CodeBlock(*index)));
                let renderer =
                    TerminalRenderer::new(TerminalCodePresenter::with_copied(copied_blocks));
                let body = renderer.render(&message.text, false);
                let copied = if self.controller.is_copied(id, CopyTarget::Message) {
                    " · copied"
                } else {
                    ""
                };
                format!("[{id}] assistant:\n{body}\n  (/copy {id} · /retry {id}{copied})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_lines_are_prompts() {
        assert_eq!(
            Command::parse("hello there"),
            Command::Submit("hello there".to_string())
        );
        assert_eq!(Command::parse("   "), Command::Submit("   ".to_string()));
    }

    #[test]
    fn parses_commands_with_ids() {
        assert_eq!(Command::parse("/cancel 3"), Command::Cancel(MessageId::new(3)));
        assert_eq!(Command::parse(" /retry #4 "), Command::Retry(MessageId::new(4)));
        assert_eq!(
            Command::parse("/copy 2"),
            Command::Copy {
                id: MessageId::new(2),
                block: None
            }
        );
        assert_eq!(
            Command::parse("/copy 2 1"),
            Command::Copy {
                id: MessageId::new(2),
                block: Some(1)
            }
        );
        assert_eq!(Command::parse("/show"), Command::Show);
        assert_eq!(Command::parse("/exit"), Command::Quit);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            Command::parse("/cancel abc"),
            Command::Invalid("`abc` is not a message id".to_string())
        );
        assert_eq!(
            Command::parse("/copy 2 x"),
            Command::Invalid("`x` is not a block number".to_string())
        );
        assert_eq!(
            Command::parse("/retry"),
            Command::Invalid("unknown command `/retry`, try /help".to_string())
        );
    }
}
