use crate::stack::{StackError, TurnStream};
use crate::types::{StepKind, TurnEvent};
use futures::StreamExt;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Service(#[from] StackError),
    #[error("failed to write event output: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders the event sequence of one turn, strictly in emission order
/// and without buffering. Inference output builds up one line from
/// deltas; replayed (non-streamed) steps arrive with their full text.
#[derive(Debug, Default)]
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> Self {
        Self
    }

    pub async fn log<W: Write>(
        &self,
        mut events: TurnStream,
        out: &mut W,
    ) -> Result<(), EventError> {
        let mut line_open = false;
        while let Some(event) = events.next().await {
            render(event?, out, &mut line_open)?;
        }
        if line_open {
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn render<W: Write>(event: TurnEvent, out: &mut W, line_open: &mut bool) -> Result<(), EventError> {
    match event {
        TurnEvent::TurnStarted { .. } | TurnEvent::TurnCompleted => {}
        TurnEvent::StepStarted {
            kind: StepKind::Inference,
        } => {
            write!(out, "inference> ")?;
            *line_open = true;
        }
        TurnEvent::StepStarted { .. } => {}
        TurnEvent::InferenceDelta { text } => {
            write!(out, "{text}")?;
            out.flush()?;
            *line_open = true;
        }
        TurnEvent::ToolCall { name, arguments } => {
            if *line_open {
                writeln!(out)?;
                *line_open = false;
            }
            writeln!(out, "tool_execution> Tool:{name} Arguments:{arguments}")?;
        }
        TurnEvent::StepCompleted {
            kind: StepKind::Inference,
            text,
        } => {
            if *line_open {
                writeln!(out)?;
                *line_open = false;
            }
            if let Some(text) = text {
                writeln!(out, "inference> {text}")?;
            }
        }
        TurnEvent::StepCompleted { .. } => {}
    }
    Ok(())
}
