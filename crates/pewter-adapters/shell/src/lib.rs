//! # Pewter Shell Adapter
//!
//! Chats with the robot from the terminal. Every line read from stdin is
//! dispatched as a message from a fixed local user; replies are printed to
//! stdout. Typing `exit` or `quit` (or closing stdin) ends the session.
//!
//! ## Configuration
//!
//! ```toml
//! [robot]
//! adapter = "shell"
//!
//! [adapters.shell]
//! # Treat every line as addressed to the robot.
//! private_chat = false
//! ```
//!
//! Without `private_chat`, only lines that start with the robot's name or
//! alias reach command routes:
//!
//! ```text
//! Pewter: ping
//! PONG
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use pewter_core::{
    Adapter, AdapterContext, AdapterError, AdapterResult, Attribute, ConfigurableAdapter,
    Dispatcher, Message, Section, Source, User, ValueKind,
};
use pewter_framework::CommandPrefix;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Id of the local shell user.
pub const SHELL_USER_ID: &str = "1";

/// Display name of the local shell user.
pub const SHELL_USER_NAME: &str = "Shell User";

/// Room every shell message is attributed to.
pub const SHELL_ROOM: &str = "shell";

/// The `adapters.shell` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub private_chat: bool,
}

/// What to do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Dispatch this message.
    Message(Message),
    /// Blank input.
    Skip,
    /// End the session.
    Exit,
}

/// The terminal adapter.
pub struct ShellAdapter {
    dispatcher: Arc<dyn Dispatcher>,
    prefix: CommandPrefix,
    config: ShellConfig,
    user: User,
    shutdown: CancellationToken,
}

impl ShellAdapter {
    /// Classifies one input line.
    pub fn parse_line(&self, line: &str) -> Line {
        let body = line.trim();
        match body {
            "" => Line::Skip,
            "exit" | "quit" => Line::Exit,
            _ => {
                let mut source = Source::new(self.user.clone()).room(SHELL_ROOM);
                if self.config.private_chat {
                    source = source.private_message();
                }
                let mut message = Message::new(body, source);
                if self.config.private_chat || self.prefix.matches(body) {
                    message = message.directed();
                }
                Line::Message(message)
            }
        }
    }

    async fn print(lines: &[String]) -> AdapterResult<()> {
        let mut out = tokio::io::stdout();
        for line in lines {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
        Ok(())
    }
}

impl ConfigurableAdapter for ShellAdapter {
    const NAME: &'static str = "shell";

    fn config(section: Section) -> Section {
        section.attribute(
            Attribute::new("private_chat")
                .kind(ValueKind::Boolean)
                .default(false),
        )
    }

    fn from_context(ctx: AdapterContext) -> AdapterResult<Self> {
        let config: ShellConfig = ctx.config_as()?;
        let prefix = CommandPrefix::new(ctx.identity())
            .map_err(|e| AdapterError::build(Self::NAME, e.to_string()))?;
        Ok(Self {
            dispatcher: Arc::clone(ctx.dispatcher()),
            prefix,
            config,
            user: User::new(SHELL_USER_ID, SHELL_USER_NAME),
            shutdown: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Adapter for ShellAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> AdapterResult<()> {
        Self::print(&["Type \"exit\" or \"quit\" to end the session.".to_string()]).await?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Shell adapter stopped");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("Shell input closed");
                break;
            };
            match self.parse_line(&line) {
                Line::Message(message) => self.dispatcher.dispatch(message).await,
                Line::Skip => {}
                Line::Exit => break,
            }
        }

        info!("Shell session ended");
        Ok(())
    }

    async fn stop(&self) -> AdapterResult<()> {
        self.shutdown.cancel();
        Ok(())
    }

    async fn send_messages(&self, _target: &Source, strings: &[String]) -> AdapterResult<()> {
        Self::print(strings).await
    }
}
