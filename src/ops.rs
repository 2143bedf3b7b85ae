use crate::api::{Project, ProjectData, ProjectPayload, Task, TaskPayload, TickTickApi};
use crate::error::{Result, TickError};
use crate::fields::{
    format_priority, is_date_only, normalize_due_date, parse_due_date, parse_priority, parse_reminder,
    PRIORITY_HIGH,
};
use crate::resolve::Resolver;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub project: Option<String>,
    pub content: Option<String>,
    pub due: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reminder: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub due: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reminder: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub color: Option<String>,
    pub view_mode: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub view_mode: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub keyword: Option<String>,
    pub tags: Vec<String>,
    pub priority: Option<String>,
}

impl NewTask {
    /// Validated request body, minus the project which needs resolving.
    /// Makes no requests.
    pub fn payload(&self) -> Result<TaskPayload> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TickError::Validation("task title cannot be empty".to_string()));
        }
        let mut payload = TaskPayload {
            title: Some(title.to_string()),
            content: self.content.clone(),
            tags: self.tags.clone(),
            ..Default::default()
        };
        apply_field_inputs(
            &mut payload,
            self.due.as_deref(),
            self.priority.as_deref(),
            self.reminder.as_deref(),
        )?;
        Ok(payload)
    }
}

impl TaskUpdate {
    pub fn payload(&self) -> Result<TaskPayload> {
        let title = match self.title.as_deref().map(str::trim) {
            Some("") => {
                return Err(TickError::Validation("task title cannot be empty".to_string()))
            }
            title => title.map(str::to_string),
        };
        let mut payload = TaskPayload {
            title,
            content: self.content.clone(),
            tags: self.tags.clone(),
            ..Default::default()
        };
        apply_field_inputs(
            &mut payload,
            self.due.as_deref(),
            self.priority.as_deref(),
            self.reminder.as_deref(),
        )?;
        Ok(payload)
    }
}

impl SearchFilter {
    /// The priority filter in canonical form, rejecting unknown levels.
    pub fn priority_level(&self) -> Result<Option<&'static str>> {
        Ok(self
            .priority
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .map(format_priority))
    }
}

/// A task operation's target after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRef {
    pub project_id: String,
    pub task_id: String,
}

/// Project and task operations over the API, with short-ID resolution
/// applied to every ID argument.
#[derive(Clone)]
pub struct Operations {
    api: Arc<dyn TickTickApi>,
    resolver: Resolver,
}

impl Operations {
    pub fn new(api: Arc<dyn TickTickApi>) -> Self {
        let resolver = Resolver::new(api.clone());
        Self { api, resolver }
    }

    // Projects

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.api.list_projects().await
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        let id = self.resolver.resolve_project_id(id).await?;
        self.api.get_project(&id).await
    }

    pub async fn project_data(&self, id: &str) -> Result<ProjectData> {
        let id = self.resolver.resolve_project_id(id).await?;
        self.api.get_project_data(&id).await
    }

    pub async fn create_project(&self, new: NewProject) -> Result<Project> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(TickError::Validation("project name cannot be empty".to_string()));
        }
        let payload = ProjectPayload {
            name: Some(name.to_string()),
            color: new.color,
            view_mode: new.view_mode,
            kind: new.kind,
        };
        self.api.create_project(&payload).await
    }

    pub async fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<Project> {
        let name = match update.name {
            Some(name) if name.trim().is_empty() => {
                return Err(TickError::Validation("project name cannot be empty".to_string()))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let payload = ProjectPayload {
            name,
            color: update.color,
            view_mode: update.view_mode,
            kind: None,
        };
        let id = self.resolver.resolve_project_id(id).await?;
        self.api.update_project(&id, &payload).await
    }

    /// Returns the resolved ID that was deleted.
    pub async fn delete_project(&self, id: &str) -> Result<String> {
        let id = self.resolver.resolve_project_id(id).await?;
        self.api.delete_project(&id).await?;
        Ok(id)
    }

    // Tasks

    /// Tasks of one project; the inbox when no project is named.
    pub async fn list_tasks(&self, project: Option<&str>) -> Result<Vec<Task>> {
        Ok(self.project_data(project.unwrap_or("")).await?.tasks)
    }

    pub async fn get_task(&self, id: &str, project: Option<&str>) -> Result<Task> {
        let target = self.task_ref(id, project).await?;
        self.api.get_task(&target.project_id, &target.task_id).await
    }

    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let mut payload = new.payload()?;
        let project_id = self
            .resolver
            .resolve_project_id(new.project.as_deref().unwrap_or(""))
            .await?;
        payload.project_id = Some(project_id);

        self.api.create_task(&payload).await
    }

    pub async fn update_task(&self, id: &str, project: Option<&str>, update: TaskUpdate) -> Result<Task> {
        let mut payload = update.payload()?;
        let target = self.task_ref(id, project).await?;
        payload.id = Some(target.task_id.clone());
        payload.project_id = Some(target.project_id);

        self.api.update_task(&target.task_id, &payload).await
    }

    pub async fn complete_task(&self, id: &str, project: Option<&str>) -> Result<TaskRef> {
        let target = self.task_ref(id, project).await?;
        self.api
            .complete_task(&target.project_id, &target.task_id)
            .await?;
        Ok(target)
    }

    pub async fn delete_task(&self, id: &str, project: Option<&str>) -> Result<TaskRef> {
        let target = self.task_ref(id, project).await?;
        self.api.delete_task(&target.project_id, &target.task_id).await?;
        Ok(target)
    }

    /// Resolve a task argument to full project and task IDs. Without a
    /// project the task is located by scanning; a task that cannot be found
    /// is aimed at the inbox and left for the server to reject.
    async fn task_ref(&self, id: &str, project: Option<&str>) -> Result<TaskRef> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TickError::Validation("task id cannot be empty".to_string()));
        }

        if let Some(project) = project {
            let project_id = self.resolver.resolve_project_id(project).await?;
            let task_id = self.resolver.resolve_task_id(id, Some(&project_id)).await?;
            return Ok(TaskRef {
                project_id,
                task_id,
            });
        }

        match self.resolver.locate_task(id, None).await? {
            Some(loc) => Ok(TaskRef {
                project_id: loc.project_id,
                task_id: loc.task.id,
            }),
            None => Ok(TaskRef {
                project_id: self.resolver.resolve_project_id("").await?,
                task_id: id.to_string(),
            }),
        }
    }

    // Filters

    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<Task>> {
        let priority = filter.priority_level()?;
        let keyword = filter
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);

        let tasks = self.all_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| match &keyword {
                Some(k) => t.title.to_lowercase().contains(k) || t.content.to_lowercase().contains(k),
                None => true,
            })
            .filter(|t| filter.tags.is_empty() || t.tags.iter().any(|tag| filter.tags.contains(tag)))
            .filter(|t| match priority {
                Some(p) => format_priority(t.priority) == p,
                None => true,
            })
            .collect())
    }

    pub async fn due_within(&self, days: i64) -> Result<Vec<Task>> {
        self.due_within_at(days, Utc::now()).await
    }

    /// Active tasks due before `now + days`, overdue ones included, earliest
    /// first. A window reaching past the representable date range has no
    /// upper bound.
    pub async fn due_within_at(&self, days: i64, now: DateTime<Utc>) -> Result<Vec<Task>> {
        if days < 0 {
            return Err(TickError::Validation("days cannot be negative".to_string()));
        }
        let cutoff = TimeDelta::try_days(days).and_then(|d| now.checked_add_signed(d));

        let mut due: Vec<(DateTime<Utc>, Task)> = self
            .all_tasks()
            .await?
            .into_iter()
            .filter(|t| !t.is_completed())
            .filter_map(|t| {
                let at = parse_due_date(t.due_date.as_deref()?)?;
                cutoff.map_or(true, |c| at <= c).then_some((at, t))
            })
            .collect();
        due.sort_by_key(|(at, _)| *at);
        Ok(due.into_iter().map(|(_, t)| t).collect())
    }

    pub async fn high_priority(&self) -> Result<Vec<Task>> {
        Ok(self
            .all_tasks()
            .await?
            .into_iter()
            .filter(|t| t.priority == PRIORITY_HIGH && !t.is_completed())
            .collect())
    }

    /// Every project's tasks, fetched one project at a time. A project the
    /// API refuses is skipped; auth and transport failures abort the scan.
    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let projects = self.api.list_projects().await?;
        let mut tasks = Vec::new();
        for project in &projects {
            match self.api.get_project_data(&project.id).await {
                Ok(data) => tasks.extend(data.tasks),
                Err(e @ TickError::ApiRequestFailed { .. }) => {
                    tracing::warn!(project = %project.id, error = %e, "skipping project");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tasks)
    }
}

/// Validate and encode the user-facing due/priority/reminder strings into
/// the payload. Runs before any request is made.
fn apply_field_inputs(
    payload: &mut TaskPayload,
    due: Option<&str>,
    priority: Option<&str>,
    reminder: Option<&str>,
) -> Result<()> {
    if let Some(due) = due {
        payload.due_date = Some(normalize_due_date(due)?);
        payload.is_all_day = Some(is_date_only(due));
    }
    if let Some(priority) = priority {
        payload.priority = Some(parse_priority(priority)?);
    }
    if let Some(reminder) = reminder {
        payload.reminders = Some(vec![parse_reminder(reminder)?]);
    }
    Ok(())
}
