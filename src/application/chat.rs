use crate::agent::Agent;
use crate::config::AppConfig;
use crate::events::{EventError, EventLogger};
use crate::registrar;
use crate::stack::{AgentService, AgentSpec, McpEndpoint, StackError, ToolGroupRegistration};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

const EXIT_SENTINEL: &str = "/bye";
const AUTO_SESSION_NAME: &str = "Auto_demo";
const INTERACTIVE_SESSION_NAME: &str = "Conversation_demo";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("tool group registration failed: {0}")]
    Registration(#[source] StackError),
    #[error(transparent)]
    Service(#[from] StackError),
    #[error(transparent)]
    Events(#[from] EventError),
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize session info: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub auto: bool,
    pub session_info_on_exit: bool,
}

/// Source of user prompts for the interactive loop. A seam rather than
/// a hard-wired stdin read so the loop can be driven by a queued
/// source in tests.
#[async_trait]
pub trait PromptSource: Send {
    /// Next line of input, `None` at end of input.
    async fn next_prompt(&mut self) -> std::io::Result<Option<String>>;
}

pub struct StdinPrompter {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptSource for StdinPrompter {
    async fn next_prompt(&mut self) -> std::io::Result<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, ">>> ")?;
        stdout.flush()?;
        self.lines.next_line().await
    }
}

/// Full conversational flow: ensure the tool group is registered,
/// create the agent, then hand off to the selected mode. Registration
/// failures are reported distinctly so the process can exit with the
/// dedicated status; every other failure propagates as-is.
pub async fn run<S, P, W>(
    service: Arc<S>,
    settings: &AppConfig,
    mcp_endpoint: &str,
    options: ChatOptions,
    prompter: &mut P,
    out: &mut W,
) -> Result<(), ChatError>
where
    S: AgentService,
    P: PromptSource,
    W: Write,
{
    let registration = ToolGroupRegistration {
        toolgroup_id: settings.toolgroup_id.clone(),
        provider_id: settings.provider_id.clone(),
        mcp_endpoint: McpEndpoint {
            uri: mcp_endpoint.to_string(),
        },
    };
    let report = registrar::ensure_registered(service.as_ref(), &registration)
        .await
        .map_err(ChatError::Registration)?;
    info!(
        toolgroups = ?report.groups,
        newly_registered = report.newly_registered,
        "Server has access to these toolgroups"
    );

    let agent = Agent::initialize(
        service,
        AgentSpec {
            model: settings.model.clone(),
            instructions: settings.instructions.clone(),
            toolgroups: vec![settings.toolgroup_id.clone()],
        },
    )
    .await?;

    if options.auto {
        run_auto(&agent, &settings.auto_prompts, out).await
    } else {
        run_interactive(&agent, prompter, out, options.session_info_on_exit).await
    }
}

async fn run_auto<S, W>(agent: &Agent<S>, prompts: &[String], out: &mut W) -> Result<(), ChatError>
where
    S: AgentService,
    W: Write,
{
    let session_id = agent.create_session(AUTO_SESSION_NAME).await?;
    for prompt in prompts {
        let events = agent.submit_turn(&session_id, prompt, true).await?;
        EventLogger::new().log(events, out).await?;
    }
    Ok(())
}

async fn run_interactive<S, P, W>(
    agent: &Agent<S>,
    prompter: &mut P,
    out: &mut W,
    session_info_on_exit: bool,
) -> Result<(), ChatError>
where
    S: AgentService,
    P: PromptSource,
    W: Write,
{
    let session_id = agent.create_session(INTERACTIVE_SESSION_NAME).await?;
    info!("Chat session started. Type '/bye' to exit.");

    while let Some(input) = prompter.next_prompt().await? {
        // Substring match on purpose: any line mentioning the sentinel
        // ends the conversation.
        if input.contains(EXIT_SENTINEL) {
            if session_info_on_exit {
                let session = agent.session_info(&session_id).await?;
                writeln!(out, "{}", serde_json::to_string_pretty(&session)?)?;
            }
            break;
        }

        let events = agent.submit_turn(&session_id, &input, false).await?;
        EventLogger::new().log(events, out).await?;
    }
    Ok(())
}
