use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Step categories reported by the agent service inside a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Inference,
    ToolExecution,
    ShieldCall,
    MemoryRetrieval,
    Unknown,
}

impl StepKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "inference" => StepKind::Inference,
            "tool_execution" => StepKind::ToolExecution,
            "shield_call" => StepKind::ShieldCall,
            "memory_retrieval" => StepKind::MemoryRetrieval,
            _ => StepKind::Unknown,
        }
    }
}

/// One element of the ordered event sequence a turn produces.
///
/// Streamed turns emit deltas as they arrive; non-streamed turns are
/// replayed as completed steps carrying their full text, so consumers
/// never need to know which wire mode produced the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TurnStarted { turn_id: String },
    StepStarted { kind: StepKind },
    InferenceDelta { text: String },
    ToolCall { name: String, arguments: String },
    StepCompleted { kind: StepKind, text: Option<String> },
    TurnCompleted,
}
