use crate::error::TickError;
use crate::ops::{NewProject, NewTask, Operations, ProjectUpdate, SearchFilter, TaskUpdate};
use crate::output;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::schemars::JsonSchema;
use rmcp::{tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProjectIdParams {
    /// Project ID, full or its first 8 characters. Empty means the inbox.
    #[serde(default)]
    pub project_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectParams {
    /// Project name
    pub name: String,
    /// Hex color, e.g. "#F18181"
    pub color: Option<String>,
    /// "list", "kanban" or "timeline"
    pub view_mode: Option<String>,
    /// "TASK" or "NOTE"
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProjectParams {
    /// Project ID, full or short
    pub project_id: String,
    pub name: Option<String>,
    pub color: Option<String>,
    pub view_mode: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTasksParams {
    /// Project ID, full or short. Omit for the inbox.
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskIdParams {
    /// Task ID, full or its first 8 characters
    pub task_id: String,
    /// Project the task belongs to; speeds up short-ID lookup
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskParams {
    /// Task title
    pub title: String,
    /// Project ID, full or short. Omit for the inbox.
    pub project_id: Option<String>,
    /// Notes / description
    pub content: Option<String>,
    /// Due date, "YYYY-MM-DD" or ISO-8601 timestamp
    pub due_date: Option<String>,
    /// none, low, medium or high
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Reminder before due time, e.g. "15m", "1h", "1d"
    pub reminder: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskParams {
    /// Task ID, full or short
    pub task_id: String,
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reminder: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Case-insensitive match on title or content
    pub keyword: Option<String>,
    /// Match tasks carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// none, low, medium or high
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DueParams {
    /// Look-ahead window in days (default 7). Overdue tasks are always included.
    pub days: Option<i64>,
}

fn respond(result: crate::error::Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => format!("Error: {}", e),
    }
}

#[derive(Clone)]
pub struct TickMcpServer {
    ops: Operations,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TickMcpServer {
    pub fn new(ops: Operations) -> Self {
        Self {
            ops,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List all projects.")]
    async fn list_projects(&self) -> String {
        respond(
            self.ops
                .list_projects()
                .await
                .and_then(|p| output::projects_json(&p)),
        )
    }

    #[tool(description = "Get a project by ID (full or 8-character short ID).")]
    async fn get_project(&self, Parameters(params): Parameters<ProjectIdParams>) -> String {
        respond(
            self.ops
                .get_project(&params.project_id)
                .await
                .and_then(|p| output::project_json(&p)),
        )
    }

    #[tool(description = "Get a project together with its tasks. Empty project_id means the inbox.")]
    async fn get_project_data(&self, Parameters(params): Parameters<ProjectIdParams>) -> String {
        respond(async {
            let data = self.ops.project_data(&params.project_id).await?;
            let tasks: Vec<output::TaskView> = data.tasks.iter().map(output::TaskView::from).collect();
            let value = serde_json::json!({
                "project": data.project.as_ref().map(output::ProjectView::from),
                "tasks": tasks,
            });
            Ok::<_, TickError>(serde_json::to_string_pretty(&value)?)
        }
        .await)
    }

    #[tool(description = "Create a project.")]
    async fn create_project(&self, Parameters(params): Parameters<CreateProjectParams>) -> String {
        let new = NewProject {
            name: params.name,
            color: params.color,
            view_mode: params.view_mode,
            kind: params.kind,
        };
        respond(
            self.ops
                .create_project(new)
                .await
                .and_then(|p| output::project_json(&p)),
        )
    }

    #[tool(description = "Update a project's name, color or view mode.")]
    async fn update_project(&self, Parameters(params): Parameters<UpdateProjectParams>) -> String {
        let update = ProjectUpdate {
            name: params.name,
            color: params.color,
            view_mode: params.view_mode,
        };
        respond(
            self.ops
                .update_project(&params.project_id, update)
                .await
                .and_then(|p| output::project_json(&p)),
        )
    }

    #[tool(description = "Delete a project and all of its tasks.")]
    async fn delete_project(&self, Parameters(params): Parameters<ProjectIdParams>) -> String {
        if params.project_id.is_empty() {
            return respond(Err(TickError::Validation(
                "project_id is required".to_string(),
            )));
        }
        respond(async {
            let id = self.ops.delete_project(&params.project_id).await?;
            Ok::<_, TickError>(serde_json::json!({ "deleted": true, "projectId": id }).to_string())
        }
        .await)
    }

    #[tool(description = "List the tasks of a project (the inbox when project_id is omitted).")]
    async fn list_tasks(&self, Parameters(params): Parameters<ListTasksParams>) -> String {
        respond(
            self.ops
                .list_tasks(params.project_id.as_deref())
                .await
                .and_then(|t| output::tasks_json(&t)),
        )
    }

    #[tool(description = "Get a task by ID (full or 8-character short ID).")]
    async fn get_task(&self, Parameters(params): Parameters<TaskIdParams>) -> String {
        respond(
            self.ops
                .get_task(&params.task_id, params.project_id.as_deref())
                .await
                .and_then(|t| output::task_json(&t)),
        )
    }

    #[tool(description = "Create a task. Only the title is required; it goes to the inbox unless a project is given.")]
    async fn create_task(&self, Parameters(params): Parameters<CreateTaskParams>) -> String {
        let new = NewTask {
            title: params.title,
            project: params.project_id,
            content: params.content,
            due: params.due_date,
            priority: params.priority,
            tags: params.tags,
            reminder: params.reminder,
        };
        respond(
            self.ops
                .create_task(new)
                .await
                .and_then(|t| output::task_json(&t)),
        )
    }

    #[tool(description = "Update a task. Only the fields given are changed.")]
    async fn update_task(&self, Parameters(params): Parameters<UpdateTaskParams>) -> String {
        let update = TaskUpdate {
            title: params.title,
            content: params.content,
            due: params.due_date,
            priority: params.priority,
            tags: params.tags,
            reminder: params.reminder,
        };
        respond(
            self.ops
                .update_task(&params.task_id, params.project_id.as_deref(), update)
                .await
                .and_then(|t| output::task_json(&t)),
        )
    }

    #[tool(description = "Mark a task as completed.")]
    async fn complete_task(&self, Parameters(params): Parameters<TaskIdParams>) -> String {
        respond(async {
            let target = self
                .ops
                .complete_task(&params.task_id, params.project_id.as_deref())
                .await?;
            Ok::<_, TickError>(serde_json::json!({
                "completed": true,
                "projectId": target.project_id,
                "taskId": target.task_id,
            })
            .to_string())
        }
        .await)
    }

    #[tool(description = "Delete a task.")]
    async fn delete_task(&self, Parameters(params): Parameters<TaskIdParams>) -> String {
        respond(async {
            let target = self
                .ops
                .delete_task(&params.task_id, params.project_id.as_deref())
                .await?;
            Ok::<_, TickError>(serde_json::json!({
                "deleted": true,
                "projectId": target.project_id,
                "taskId": target.task_id,
            })
            .to_string())
        }
        .await)
    }

    #[tool(description = "Search tasks across all projects by keyword, tags and priority. Filters combine with AND.")]
    async fn search_tasks(&self, Parameters(params): Parameters<SearchParams>) -> String {
        let filter = SearchFilter {
            keyword: params.keyword,
            tags: params.tags,
            priority: params.priority,
        };
        respond(
            self.ops
                .search(&filter)
                .await
                .and_then(|t| output::tasks_json(&t)),
        )
    }

    #[tool(description = "Active tasks due within N days, overdue ones included, earliest first.")]
    async fn due_tasks(&self, Parameters(params): Parameters<DueParams>) -> String {
        respond(
            self.ops
                .due_within(params.days.unwrap_or(7))
                .await
                .and_then(|t| output::tasks_json(&t)),
        )
    }

    #[tool(description = "Active high-priority tasks across all projects.")]
    async fn high_priority_tasks(&self) -> String {
        respond(
            self.ops
                .high_priority()
                .await
                .and_then(|t| output::tasks_json(&t)),
        )
    }
}

#[tool_handler]
impl ServerHandler for TickMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "tick".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "TickTick tools. IDs may be given in full or as their first 8 characters. Use list_projects to discover projects, create_task to add tasks, search_tasks, due_tasks and high_priority_tasks to find them.".to_string(),
            ),
        }
    }
}

pub async fn run_mcp_server(ops: Operations) -> crate::error::Result<()> {
    tracing::info!("starting MCP server on stdio");
    let server = TickMcpServer::new(ops);
    let transport = rmcp::transport::io::stdio();
    let running = server
        .serve(transport)
        .await
        .map_err(|e| TickError::Other(format!("MCP server error: {}", e)))?;
    running
        .waiting()
        .await
        .map_err(|e| TickError::Other(format!("MCP server error: {}", e)))?;
    Ok(())
}
