use crate::types::{ChatMessage, StepKind, TurnEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, info};

/// Ordered, lazily produced events of one turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = Result<TurnEvent, StackError>> + Send>>;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("request to agent service failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("event stream from agent service failed: {0}")]
    Stream(#[from] reqwest_eventsource::Error),
    #[error("agent service returned invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGroupSummary {
    pub toolgroup_id: String,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct McpEndpoint {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolGroupRegistration {
    pub toolgroup_id: String,
    pub provider_id: String,
    pub mcp_endpoint: McpEndpoint,
}

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub model: String,
    pub instructions: String,
    pub toolgroups: Vec<String>,
}

#[derive(Debug)]
pub struct TurnRequest {
    pub agent_id: String,
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub session_name: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub turns: Value,
}

/// The remote agent service this process talks to. Everything behind
/// this seam is owned by the service: inference, tool invocation, and
/// the event encoding of a turn.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn list_tool_groups(&self) -> Result<Vec<ToolGroupSummary>, StackError>;
    async fn register_tool_group(
        &self,
        registration: &ToolGroupRegistration,
    ) -> Result<(), StackError>;
    async fn create_agent(&self, spec: &AgentSpec) -> Result<String, StackError>;
    async fn create_session(
        &self,
        agent_id: &str,
        session_name: &str,
    ) -> Result<String, StackError>;
    async fn create_turn(&self, request: TurnRequest) -> Result<TurnStream, StackError>;
    async fn retrieve_session(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<SessionInfo, StackError>;
}

#[derive(Clone)]
pub struct StackClient {
    http: Client,
    base_url: String,
}

impl StackClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{trimmed}/{path}")
    }
}

#[async_trait]
impl AgentService for StackClient {
    async fn list_tool_groups(&self) -> Result<Vec<ToolGroupSummary>, StackError> {
        let url = self.endpoint("/v1/toolgroups");
        debug!(url = %url, "Listing registered tool groups");
        let response: ListResponse<ToolGroupDto> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response
            .data
            .into_iter()
            .map(|group| ToolGroupSummary {
                toolgroup_id: group.identifier,
                provider_id: group.provider_id,
            })
            .collect())
    }

    async fn register_tool_group(
        &self,
        registration: &ToolGroupRegistration,
    ) -> Result<(), StackError> {
        let url = self.endpoint("/v1/toolgroups");
        info!(
            toolgroup_id = registration.toolgroup_id.as_str(),
            endpoint = registration.mcp_endpoint.uri.as_str(),
            "Registering tool group"
        );
        self.http
            .post(url)
            .json(registration)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn create_agent(&self, spec: &AgentSpec) -> Result<String, StackError> {
        let url = self.endpoint("/v1/agents");
        let payload = AgentCreatePayload {
            agent_config: AgentConfigDto {
                model: &spec.model,
                instructions: &spec.instructions,
                toolgroups: &spec.toolgroups,
                tool_config: ToolConfigDto {
                    tool_choice: "auto",
                },
            },
        };
        let response: AgentCreateResponse = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(agent_id = response.agent_id.as_str(), "Agent created");
        Ok(response.agent_id)
    }

    async fn create_session(
        &self,
        agent_id: &str,
        session_name: &str,
    ) -> Result<String, StackError> {
        let url = self.endpoint(&format!("/v1/agents/{agent_id}/session"));
        let response: SessionCreateResponse = self
            .http
            .post(url)
            .json(&SessionCreatePayload { session_name })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(
            session_id = response.session_id.as_str(),
            "Session created"
        );
        Ok(response.session_id)
    }

    async fn create_turn(&self, request: TurnRequest) -> Result<TurnStream, StackError> {
        let url = self.endpoint(&format!(
            "/v1/agents/{}/session/{}/turn",
            request.agent_id, request.session_id
        ));
        let payload = TurnPayload {
            messages: &request.messages,
            stream: request.stream,
        };
        info!(
            session_id = request.session_id.as_str(),
            stream = request.stream,
            "Submitting turn"
        );
        if request.stream {
            let source = self
                .http
                .post(url)
                .json(&payload)
                .eventsource()
                .map_err(|err| StackError::InvalidResponse(err.to_string()))?;
            Ok(stream_events(source))
        } else {
            let turn: TurnDto = self
                .http
                .post(url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let events = replay_turn(turn);
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }
    }

    async fn retrieve_session(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<SessionInfo, StackError> {
        let url = self.endpoint(&format!("/v1/agents/{agent_id}/session/{session_id}"));
        let session: SessionInfo = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(session)
    }
}

fn stream_events(source: EventSource) -> TurnStream {
    Box::pin(stream::unfold(source, |mut source| async move {
        loop {
            match source.next().await {
                None => return None,
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => match decode_chunk(&message.data) {
                    Ok(Some(event)) => {
                        // The service keeps the connection open after the
                        // final payload; close instead of reconnecting.
                        if matches!(event, TurnEvent::TurnCompleted) {
                            source.close();
                        }
                        return Some((Ok(event), source));
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        source.close();
                        return Some((Err(err), source));
                    }
                },
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                    source.close();
                    return None;
                }
                Some(Err(err)) => {
                    source.close();
                    return Some((Err(err.into()), source));
                }
            }
        }
    }))
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ToolGroupDto {
    identifier: String,
    provider_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentCreatePayload<'a> {
    agent_config: AgentConfigDto<'a>,
}

#[derive(Debug, Serialize)]
struct AgentConfigDto<'a> {
    model: &'a str,
    instructions: &'a str,
    toolgroups: &'a [String],
    tool_config: ToolConfigDto,
}

#[derive(Debug, Serialize)]
struct ToolConfigDto {
    tool_choice: &'static str,
}

#[derive(Debug, Deserialize)]
struct AgentCreateResponse {
    agent_id: String,
}

#[derive(Debug, Serialize)]
struct SessionCreatePayload<'a> {
    session_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionCreateResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct TurnPayload<'a> {
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    event: ChunkEvent,
}

#[derive(Debug, Deserialize)]
struct ChunkEvent {
    payload: EventPayloadDto,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum EventPayloadDto {
    TurnStart {
        turn_id: String,
    },
    TurnComplete {},
    TurnAwaitingInput {},
    StepStart {
        step_type: String,
    },
    StepProgress {
        #[serde(default)]
        delta: Option<DeltaDto>,
    },
    StepComplete {
        step_type: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaDto {
    Text {
        text: String,
    },
    ToolCall {
        tool_call: Value,
        #[serde(default)]
        parse_status: Option<String>,
    },
    Image {},
}

fn decode_chunk(data: &str) -> Result<Option<TurnEvent>, StackError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|err| StackError::InvalidResponse(format!("undecodable stream chunk: {err}")))?;
    let event = match chunk.event.payload {
        EventPayloadDto::TurnStart { turn_id } => Some(TurnEvent::TurnStarted { turn_id }),
        EventPayloadDto::TurnComplete {} => Some(TurnEvent::TurnCompleted),
        EventPayloadDto::TurnAwaitingInput {} => None,
        EventPayloadDto::StepStart { step_type } => Some(TurnEvent::StepStarted {
            kind: StepKind::parse(&step_type),
        }),
        EventPayloadDto::StepProgress { delta } => match delta {
            Some(DeltaDto::Text { text }) => Some(TurnEvent::InferenceDelta { text }),
            Some(DeltaDto::ToolCall {
                tool_call,
                parse_status,
            }) => tool_call_event(tool_call, parse_status.as_deref()),
            _ => None,
        },
        EventPayloadDto::StepComplete { step_type } => Some(TurnEvent::StepCompleted {
            kind: StepKind::parse(&step_type),
            text: None,
        }),
    };
    Ok(event)
}

/// Tool call deltas stream as partial text until the service finishes
/// parsing them; only the completed call is worth rendering.
fn tool_call_event(tool_call: Value, parse_status: Option<&str>) -> Option<TurnEvent> {
    if parse_status.is_some_and(|status| status != "succeeded") {
        return None;
    }
    let name = tool_call.get("tool_name")?.as_str()?.to_string();
    let arguments = tool_call
        .get("arguments")
        .map(Value::to_string)
        .unwrap_or_default();
    Some(TurnEvent::ToolCall { name, arguments })
}

#[derive(Debug, Deserialize)]
struct TurnDto {
    turn_id: String,
    #[serde(default)]
    steps: Vec<StepDto>,
}

#[derive(Debug, Deserialize)]
struct StepDto {
    step_type: String,
    #[serde(default)]
    model_response: Option<MessageDto>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDto>>,
}

#[derive(Debug, Deserialize)]
struct MessageDto {
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCallDto {
    tool_name: String,
    #[serde(default)]
    arguments: Value,
}

/// Replay a completed turn as the same ordered event vocabulary a
/// streamed turn produces, carrying the full step text instead of
/// deltas.
fn replay_turn(turn: TurnDto) -> Vec<TurnEvent> {
    let mut events = vec![TurnEvent::TurnStarted {
        turn_id: turn.turn_id,
    }];
    for step in turn.steps {
        let kind = StepKind::parse(&step.step_type);
        match kind {
            StepKind::Inference => {
                let text = step
                    .model_response
                    .as_ref()
                    .map(|message| flatten_content(&message.content));
                events.push(TurnEvent::StepCompleted { kind, text });
            }
            StepKind::ToolExecution => {
                for call in step.tool_calls.unwrap_or_default() {
                    events.push(TurnEvent::ToolCall {
                        name: call.tool_name,
                        arguments: call.arguments.to_string(),
                    });
                }
                events.push(TurnEvent::StepCompleted { kind, text: None });
            }
            _ => events.push(TurnEvent::StepCompleted { kind, text: None }),
        }
    }
    events.push(TurnEvent::TurnCompleted);
    events
}

/// Message content arrives either as a bare string or as a list of
/// typed content items.
fn flatten_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.as_str(),
                other => other.get("text").and_then(Value::as_str).unwrap_or(""),
            })
            .collect(),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_joins_paths_correctly() {
        let client = StackClient::new("http://localhost:8321/");
        assert_eq!(
            client.endpoint("/v1/toolgroups"),
            "http://localhost:8321/v1/toolgroups"
        );
    }

    #[test]
    fn registration_payload_matches_wire_shape() {
        let registration = ToolGroupRegistration {
            toolgroup_id: "mcp::openshift".into(),
            provider_id: "model-context-protocol".into(),
            mcp_endpoint: McpEndpoint {
                uri: "http://host.containers.internal:8000/sse".into(),
            },
        };
        let payload = serde_json::to_value(&registration).expect("serialize");
        assert_eq!(payload["toolgroup_id"], "mcp::openshift");
        assert_eq!(payload["provider_id"], "model-context-protocol");
        assert_eq!(
            payload["mcp_endpoint"]["uri"],
            "http://host.containers.internal:8000/sse"
        );
    }

    #[test]
    fn decodes_text_delta_chunk() {
        let data = r#"{"event":{"payload":{"event_type":"step_progress","step_type":"inference","delta":{"type":"text","text":"Hello"}}}}"#;
        let event = decode_chunk(data).expect("decodes");
        assert_eq!(
            event,
            Some(TurnEvent::InferenceDelta {
                text: "Hello".into()
            })
        );
    }

    #[test]
    fn decodes_lifecycle_chunks() {
        let start = r#"{"event":{"payload":{"event_type":"turn_start","turn_id":"t-1"}}}"#;
        assert_eq!(
            decode_chunk(start).expect("decodes"),
            Some(TurnEvent::TurnStarted { turn_id: "t-1".into() })
        );

        let step = r#"{"event":{"payload":{"event_type":"step_start","step_type":"inference","step_id":"s-1"}}}"#;
        assert_eq!(
            decode_chunk(step).expect("decodes"),
            Some(TurnEvent::StepStarted {
                kind: StepKind::Inference
            })
        );

        let complete = r#"{"event":{"payload":{"event_type":"turn_complete","turn":{"turn_id":"t-1"}}}}"#;
        assert_eq!(
            decode_chunk(complete).expect("decodes"),
            Some(TurnEvent::TurnCompleted)
        );
    }

    #[test]
    fn renders_only_parsed_tool_call_deltas() {
        let partial = r#"{"event":{"payload":{"event_type":"step_progress","delta":{"type":"tool_call","tool_call":"{\"tool_na","parse_status":"in_progress"}}}}"#;
        assert_eq!(decode_chunk(partial).expect("decodes"), None);

        let parsed = r#"{"event":{"payload":{"event_type":"step_progress","delta":{"type":"tool_call","tool_call":{"call_id":"c-1","tool_name":"pods_list","arguments":{"namespace":"demo"}},"parse_status":"succeeded"}}}}"#;
        let event = decode_chunk(parsed).expect("decodes").expect("event");
        match event {
            TurnEvent::ToolCall { name, arguments } => {
                assert_eq!(name, "pods_list");
                assert!(arguments.contains("namespace"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rejects_undecodable_chunk() {
        let error = decode_chunk("not json").expect_err("fails");
        assert!(matches!(error, StackError::InvalidResponse(_)));
    }

    #[test]
    fn replays_completed_turn_in_order() {
        let turn: TurnDto = serde_json::from_value(json!({
            "turn_id": "t-9",
            "steps": [
                {
                    "step_type": "inference",
                    "model_response": {"role": "assistant", "content": ""}
                },
                {
                    "step_type": "tool_execution",
                    "tool_calls": [
                        {"call_id": "c-1", "tool_name": "pods_list", "arguments": {"namespace": "demo"}}
                    ],
                    "tool_responses": []
                },
                {
                    "step_type": "inference",
                    "model_response": {
                        "role": "assistant",
                        "content": [{"type": "text", "text": "Two pods are running."}]
                    }
                }
            ]
        }))
        .expect("turn decodes");

        let events = replay_turn(turn);
        assert_eq!(
            events[0],
            TurnEvent::TurnStarted { turn_id: "t-9".into() }
        );
        assert!(matches!(
            events[1],
            TurnEvent::StepCompleted {
                kind: StepKind::Inference,
                ..
            }
        ));
        assert!(matches!(events[2], TurnEvent::ToolCall { .. }));
        assert!(matches!(
            events[3],
            TurnEvent::StepCompleted {
                kind: StepKind::ToolExecution,
                text: None
            }
        ));
        assert_eq!(
            events[4],
            TurnEvent::StepCompleted {
                kind: StepKind::Inference,
                text: Some("Two pods are running.".into())
            }
        );
        assert_eq!(events[5], TurnEvent::TurnCompleted);
    }

    #[test]
    fn flattens_string_and_item_content() {
        assert_eq!(flatten_content(&json!("plain")), "plain");
        assert_eq!(
            flatten_content(&json!([
                {"type": "text", "text": "first "},
                {"type": "text", "text": "second"}
            ])),
            "first second"
        );
        assert_eq!(flatten_content(&json!({"type": "text", "text": "one"})), "one");
        assert_eq!(flatten_content(&json!(null)), "");
    }
}
