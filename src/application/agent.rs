use crate::stack::{AgentService, AgentSpec, SessionInfo, StackError, TurnRequest, TurnStream};
use crate::types::ChatMessage;
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to one agent instance on the remote service. Creating the
/// handle creates the agent server-side; sessions and turns are then
/// scoped to its id for the life of the process.
pub struct Agent<S: AgentService> {
    service: Arc<S>,
    agent_id: String,
}

impl<S: AgentService> Agent<S> {
    pub async fn initialize(service: Arc<S>, spec: AgentSpec) -> Result<Self, StackError> {
        let agent_id = service.create_agent(&spec).await?;
        info!(
            agent_id = agent_id.as_str(),
            model = spec.model.as_str(),
            "Agent created on remote service"
        );
        Ok(Self { service, agent_id })
    }

    pub async fn create_session(&self, session_name: &str) -> Result<String, StackError> {
        let session_id = self
            .service
            .create_session(&self.agent_id, session_name)
            .await?;
        debug!(
            session_id = session_id.as_str(),
            session_name, "Session opened"
        );
        Ok(session_id)
    }

    pub async fn submit_turn(
        &self,
        session_id: &str,
        content: &str,
        stream: bool,
    ) -> Result<TurnStream, StackError> {
        self.service
            .create_turn(TurnRequest {
                agent_id: self.agent_id.clone(),
                session_id: session_id.to_string(),
                messages: vec![ChatMessage::user(content)],
                stream,
            })
            .await
    }

    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo, StackError> {
        self.service
            .retrieve_session(&self.agent_id, session_id)
            .await
    }
}
