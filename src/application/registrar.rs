use crate::stack::{AgentService, StackError, ToolGroupRegistration};
use std::collections::BTreeSet;
use tracing::{debug, error, info};

/// Outcome of the startup registration pass. `groups` is the snapshot
/// listed before any registration attempt and is not re-fetched, so a
/// group registered by this run does not appear in it.
#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub groups: BTreeSet<String>,
    pub newly_registered: bool,
}

/// Register the tool group unless the service already knows it.
///
/// At most one mutation is issued per process run. A failed
/// registration is logged and returned as-is; the caller decides the
/// process fate (this is the only fail-fast path in the program —
/// a bad tool endpoint will not get better by retrying).
pub async fn ensure_registered<S>(
    service: &S,
    registration: &ToolGroupRegistration,
) -> Result<RegistrationReport, StackError>
where
    S: AgentService + ?Sized,
{
    let listed = service.list_tool_groups().await?;
    let existing_provider = listed
        .iter()
        .find(|group| group.toolgroup_id == registration.toolgroup_id)
        .map(|group| group.provider_id.clone());
    let groups: BTreeSet<String> = listed
        .into_iter()
        .map(|group| group.toolgroup_id)
        .collect();

    if let Some(provider_id) = existing_provider {
        debug!(
            toolgroup_id = registration.toolgroup_id.as_str(),
            provider_id = provider_id.as_deref().unwrap_or("unknown"),
            "Tool group already registered; skipping"
        );
        return Ok(RegistrationReport {
            groups,
            newly_registered: false,
        });
    }

    match service.register_tool_group(registration).await {
        Ok(()) => {
            info!("MCP tools registered successfully");
            Ok(RegistrationReport {
                groups,
                newly_registered: true,
            })
        }
        Err(err) => {
            error!(error = %err, "Error registering MCP tools");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{
        AgentSpec, McpEndpoint, SessionInfo, ToolGroupSummary, TurnRequest, TurnStream,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeService {
        groups: Vec<&'static str>,
        fail_register: bool,
        register_calls: Mutex<usize>,
    }

    impl FakeService {
        fn with_groups(groups: Vec<&'static str>) -> Self {
            Self {
                groups,
                fail_register: false,
                register_calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                groups: Vec::new(),
                fail_register: true,
                register_calls: Mutex::new(0),
            }
        }

        fn register_calls(&self) -> usize {
            *self.register_calls.lock().expect("lock")
        }
    }

    #[async_trait]
    impl AgentService for FakeService {
        async fn list_tool_groups(&self) -> Result<Vec<ToolGroupSummary>, StackError> {
            Ok(self
                .groups
                .iter()
                .map(|id| ToolGroupSummary {
                    toolgroup_id: id.to_string(),
                    provider_id: Some("model-context-protocol".into()),
                })
                .collect())
        }

        async fn register_tool_group(
            &self,
            _registration: &ToolGroupRegistration,
        ) -> Result<(), StackError> {
            *self.register_calls.lock().expect("lock") += 1;
            if self.fail_register {
                Err(StackError::InvalidResponse("provider rejected".into()))
            } else {
                Ok(())
            }
        }

        async fn create_agent(&self, _spec: &AgentSpec) -> Result<String, StackError> {
            unreachable!("registrar never creates agents")
        }

        async fn create_session(
            &self,
            _agent_id: &str,
            _session_name: &str,
        ) -> Result<String, StackError> {
            unreachable!("registrar never creates sessions")
        }

        async fn create_turn(&self, _request: TurnRequest) -> Result<TurnStream, StackError> {
            unreachable!("registrar never submits turns")
        }

        async fn retrieve_session(
            &self,
            _agent_id: &str,
            _session_id: &str,
        ) -> Result<SessionInfo, StackError> {
            unreachable!("registrar never retrieves sessions")
        }
    }

    fn registration() -> ToolGroupRegistration {
        ToolGroupRegistration {
            toolgroup_id: "mcp::openshift".into(),
            provider_id: "model-context-protocol".into(),
            mcp_endpoint: McpEndpoint {
                uri: "http://host.containers.internal:8000/sse".into(),
            },
        }
    }

    #[tokio::test]
    async fn registers_when_group_absent() {
        let service = FakeService::with_groups(vec!["builtin::websearch"]);
        let report = ensure_registered(&service, &registration())
            .await
            .expect("registration succeeds");

        assert!(report.newly_registered);
        assert_eq!(service.register_calls(), 1);
        // Snapshot is taken before the mutation and never refreshed.
        assert!(!report.groups.contains("mcp::openshift"));
        assert!(report.groups.contains("builtin::websearch"));
    }

    #[tokio::test]
    async fn skips_when_group_already_present() {
        let service = FakeService::with_groups(vec!["mcp::openshift", "builtin::websearch"]);

        let first = ensure_registered(&service, &registration())
            .await
            .expect("first pass succeeds");
        let second = ensure_registered(&service, &registration())
            .await
            .expect("second pass succeeds");

        assert!(!first.newly_registered);
        assert!(!second.newly_registered);
        assert_eq!(service.register_calls(), 0);
        assert!(second.groups.contains("mcp::openshift"));
    }

    #[tokio::test]
    async fn surfaces_registration_failure() {
        let service = FakeService::failing();
        let error = ensure_registered(&service, &registration())
            .await
            .expect_err("registration fails");

        assert!(matches!(error, StackError::InvalidResponse(_)));
        assert_eq!(service.register_calls(), 1);
    }
}
