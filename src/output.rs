//! Reshaping of API records for display: short IDs, textual priority and
//! status, one-line text rendering.

use crate::api::{Project, Task};
use crate::error::Result;
use crate::fields::format_priority;
use crate::resolve::short_id;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView<'a> {
    pub id: &'a str,
    pub short_id: &'a str,
    pub project_id: &'a str,
    pub title: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<&'a str>,
    pub priority: &'static str,
    pub tags: &'a [String],
    pub status: &'static str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub reminders: &'a [String],
}

impl<'a> From<&'a Task> for TaskView<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            short_id: short_id(&task.id),
            project_id: &task.project_id,
            title: &task.title,
            content: &task.content,
            due_date: task.due_date.as_deref(),
            priority: format_priority(task.priority),
            tags: &task.tags,
            status: if task.is_completed() { "completed" } else { "active" },
            reminders: &task.reminders,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView<'a> {
    pub id: &'a str,
    pub short_id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'a str>,
    pub closed: bool,
}

impl<'a> From<&'a Project> for ProjectView<'a> {
    fn from(project: &'a Project) -> Self {
        Self {
            id: &project.id,
            short_id: short_id(&project.id),
            name: &project.name,
            color: project.color.as_deref(),
            view_mode: project.view_mode.as_deref(),
            kind: project.kind.as_deref(),
            closed: project.closed,
        }
    }
}

pub fn tasks_json(tasks: &[Task]) -> Result<String> {
    let views: Vec<TaskView> = tasks.iter().map(TaskView::from).collect();
    Ok(serde_json::to_string_pretty(&views)?)
}

pub fn task_json(task: &Task) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TaskView::from(task))?)
}

pub fn projects_json(projects: &[Project]) -> Result<String> {
    let views: Vec<ProjectView> = projects.iter().map(ProjectView::from).collect();
    Ok(serde_json::to_string_pretty(&views)?)
}

pub fn project_json(project: &Project) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ProjectView::from(project))?)
}

/// `[ ] 6571f0e2  Title  (due 2024-05-11, high, #work #home)`
pub fn task_line(task: &Task) -> String {
    let status = if task.is_completed() { "x" } else { " " };
    let mut line = format!("[{}] {}  {}", status, short_id(&task.id), task.title);

    let mut extras = Vec::new();
    if let Some(due) = &task.due_date {
        extras.push(format!("due {}", due.get(..10).unwrap_or(due)));
    }
    match format_priority(task.priority) {
        "none" => {}
        p => extras.push(p.to_string()),
    }
    if !task.tags.is_empty() {
        extras.push(
            task.tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    if !extras.is_empty() {
        line.push_str(&format!("  ({})", extras.join(", ")));
    }
    line
}

pub fn task_detail(task: &Task) -> String {
    let mut out = task_line(task);
    out.push_str(&format!("\n    id:       {}", task.id));
    out.push_str(&format!("\n    project:  {}", task.project_id));
    if !task.content.is_empty() {
        for line in task.content.lines() {
            out.push_str(&format!("\n      {}", line));
        }
    }
    out
}

pub fn project_line(project: &Project) -> String {
    let mut line = format!("{}  {}", short_id(&project.id), project.name);
    if project.closed {
        line.push_str("  (closed)");
    }
    line
}
