//! External interfaces the orchestrator consumes (§6): the conversation
//! store and the sandbox filesystem. Both are implemented by the host
//! application; this crate only depends on the trait shape.

use async_trait::async_trait;
use ctxcore_core::{Message, OrchestratorError};
use serde_json::Value;

/// A sandbox descriptor as returned by `get_project`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDescriptor {
    pub id: String,
    pub pass: String,
    pub vnc_preview: Option<String>,
    pub sandbox_url: Option<String>,
    pub token: Option<String>,
}

/// A thread descriptor as returned by `get_thread`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadDescriptor {
    pub thread_id: String,
    pub project_id: Option<String>,
    pub metadata: Value,
}

/// One page of `list_messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// The conversation store this core reads turns from and writes emitted
/// messages back to.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// `order=created_at asc`. `batch` caps the page size; callers page
    /// through with repeated calls using the returned `has_more` flag.
    async fn list_messages(
        &self,
        thread_id: &str,
        is_llm_message: bool,
        batch: usize,
        after: Option<&str>,
    ) -> Result<MessagePage, OrchestratorError>;

    async fn get_thread(&self, thread_id: &str) -> Result<ThreadDescriptor, OrchestratorError>;

    async fn get_project(&self, project_id: &str) -> Result<ProjectDescriptor, OrchestratorError>;

    #[allow(clippy::too_many_arguments)]
    async fn insert_message(
        &self,
        thread_id: &str,
        message_type: &str,
        content: &Message,
        is_llm_message: bool,
        metadata: Option<Value>,
        agent_id: Option<&str>,
        agent_version_id: Option<&str>,
    ) -> Result<(), OrchestratorError>;
}

/// One entry returned by `list_files`.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxFileEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: chrono::DateTime<chrono::Utc>,
}

/// The sandbox filesystem this core writes to and reads from on behalf of
/// the agent. All paths are absolute under the workspace root.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    async fn make_dir(&self, path: &str, mode: u32) -> Result<(), OrchestratorError>;

    async fn upload_file(&self, bytes: &[u8], path: &str) -> Result<(), OrchestratorError>;

    async fn download_file(&self, path: &str) -> Result<Vec<u8>, OrchestratorError>;

    async fn delete_file(&self, path: &str) -> Result<(), OrchestratorError>;

    async fn list_files(&self, path: &str) -> Result<Vec<SandboxFileEntry>, OrchestratorError>;
}
