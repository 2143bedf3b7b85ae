//! Short-ID expansion.
//!
//! Users may type the first eight characters of a project or task ID.
//! Resolution is a convenience: an ID that matches nothing is passed through
//! unchanged and the server decides whether it exists.

use crate::api::{Task, TickTickApi};
use crate::error::{Result, TickError};
use std::sync::Arc;

pub const SHORT_ID_LEN: usize = 8;

const INBOX_PREFIX: &str = "inbox";

pub fn is_short_id(id: &str) -> bool {
    id.chars().count() <= SHORT_ID_LEN
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Where a task was found during a scan.
#[derive(Debug, Clone)]
pub struct TaskLocation {
    pub project_id: String,
    pub task: Task,
}

#[derive(Clone)]
pub struct Resolver {
    api: Arc<dyn TickTickApi>,
}

impl Resolver {
    pub fn new(api: Arc<dyn TickTickApi>) -> Self {
        Self { api }
    }

    /// Empty input means the inbox. Full IDs come back untouched without a
    /// request; short ones take the first listed project with that prefix.
    pub async fn resolve_project_id(&self, maybe_short: &str) -> Result<String> {
        if !maybe_short.is_empty() && !is_short_id(maybe_short) {
            return Ok(maybe_short.to_string());
        }

        let projects = self.api.list_projects().await?;

        if maybe_short.is_empty() {
            return projects
                .into_iter()
                .find(|p| p.id.starts_with(INBOX_PREFIX))
                .map(|p| p.id)
                .ok_or(TickError::InboxNotFound);
        }

        Ok(projects
            .into_iter()
            .find(|p| p.id.starts_with(maybe_short))
            .map(|p| p.id)
            .unwrap_or_else(|| maybe_short.to_string()))
    }

    pub async fn resolve_task_id(&self, maybe_short: &str, project_hint: Option<&str>) -> Result<String> {
        if maybe_short.is_empty() || !is_short_id(maybe_short) {
            return Ok(maybe_short.to_string());
        }
        Ok(self
            .locate_task(maybe_short, project_hint)
            .await?
            .map(|loc| loc.task.id)
            .unwrap_or_else(|| maybe_short.to_string()))
    }

    /// Find the first task whose ID starts with `prefix`, checking the hinted
    /// project first and then every listed project in order. Projects whose
    /// task list the API refuses are skipped; any other failure is returned.
    pub async fn locate_task(&self, prefix: &str, project_hint: Option<&str>) -> Result<Option<TaskLocation>> {
        let mut searched_hint = None;

        if let Some(hint) = project_hint.filter(|h| !h.is_empty()) {
            match self.api.get_project_data(hint).await {
                Ok(data) => {
                    if let Some(task) = data.tasks.into_iter().find(|t| t.id.starts_with(prefix)) {
                        return Ok(Some(TaskLocation {
                            project_id: hint.to_string(),
                            task,
                        }));
                    }
                    searched_hint = Some(hint);
                }
                Err(e @ TickError::ApiRequestFailed { .. }) => {
                    tracing::debug!(project = hint, error = %e, "hinted project lookup failed");
                }
                Err(e) => return Err(e),
            }
        }

        let projects = self.api.list_projects().await?;
        for project in projects {
            if searched_hint == Some(project.id.as_str()) {
                continue;
            }
            let data = match self.api.get_project_data(&project.id).await {
                Ok(data) => data,
                Err(e @ TickError::ApiRequestFailed { .. }) => {
                    tracing::warn!(project = %project.id, error = %e, "skipping project");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(task) = data.tasks.into_iter().find(|t| t.id.starts_with(prefix)) {
                return Ok(Some(TaskLocation {
                    project_id: project.id,
                    task,
                }));
            }
        }

        Ok(None)
    }
}
