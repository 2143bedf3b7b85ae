use crate::api::{HttpApi, Task};
use crate::config::{Credentials, Region};
use crate::error::{Result, TickError};
use crate::fields::parse_tags;
use crate::oauth::{self, HttpTokenGrant, TokenManager};
use crate::ops::{NewProject, NewTask, Operations, ProjectUpdate, SearchFilter, TaskUpdate};
use crate::output;
use crate::token::{is_expired, FileTokenStore, TokenStore};
use crate::{TaskCommands, TaskFieldArgs};
use std::io::{BufRead, Write};
use std::sync::Arc;

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("tick/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn token_manager(credentials: &Credentials, client: reqwest::Client) -> TokenManager {
    TokenManager::new(
        Box::new(FileTokenStore::new(Credentials::token_path())),
        Box::new(HttpTokenGrant::new(credentials.clone(), client)),
    )
}

/// Wire up the API client for the configured region.
pub fn operations() -> Result<Operations> {
    let credentials = Credentials::load()?;
    let client = http_client()?;
    let tokens = token_manager(&credentials, client.clone());
    let api = HttpApi::new(client, credentials.region.api_base(), tokens)?;
    Ok(Operations::new(Arc::new(api)))
}

// Auth

pub fn auth_setup(client_id: &str, client_secret: &str, redirect_uri: &str, region: &str) -> Result<()> {
    let region: Region = region.parse()?;
    if client_id.trim().is_empty() || client_secret.trim().is_empty() {
        return Err(TickError::Validation(
            "client id and secret cannot be empty".to_string(),
        ));
    }
    let credentials = Credentials {
        client_id: client_id.trim().to_string(),
        client_secret: client_secret.trim().to_string(),
        redirect_uri: redirect_uri.to_string(),
        region,
    };
    credentials.save()?;
    println!("saved {}", Credentials::config_path().display());
    Ok(())
}

pub async fn auth_login(code: Option<String>) -> Result<()> {
    let credentials = Credentials::load()?;
    let tokens = token_manager(&credentials, http_client()?);

    let code = match code {
        Some(code) => oauth::extract_code(&code, None)?,
        None => {
            let state = oauth::new_state();
            println!("Open this URL in your browser and authorize tick:\n");
            println!("  {}\n", oauth::authorize_url(&credentials, &state)?);
            print!("Paste the redirect URL (or just the code): ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            oauth::extract_code(&line, Some(&state))?
        }
    };

    let token = tokens.login(&code).await?;
    println!("authenticated, token valid until {}", format_millis(token.expires_at));
    Ok(())
}

pub fn auth_status(json: bool) -> Result<()> {
    let store = FileTokenStore::new(Credentials::token_path());
    let token = store.load()?;

    if json {
        let value = match &token {
            Some(t) => serde_json::json!({
                "authenticated": true,
                "expiresAt": t.expires_at,
                "expired": is_expired(t),
            }),
            None => serde_json::json!({ "authenticated": false }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match token {
        None => println!("not authenticated"),
        Some(t) if is_expired(&t) => println!(
            "authenticated, token expired at {} (refreshed on next request)",
            format_millis(t.expires_at)
        ),
        Some(t) => println!(
            "authenticated, token valid until {}",
            format_millis(t.expires_at)
        ),
    }
    Ok(())
}

/// Needs no credentials: logging out only wipes the token file.
pub fn auth_logout() -> Result<()> {
    let store = FileTokenStore::new(Credentials::token_path());
    store.clear()?;
    tracing::info!("token cleared");
    println!("logged out");
    Ok(())
}

pub async fn auth_refresh() -> Result<()> {
    let credentials = Credentials::load()?;
    let tokens = token_manager(&credentials, http_client()?);
    let token = tokens.force_refresh().await?;
    println!("token refreshed, valid until {}", format_millis(token.expires_at));
    Ok(())
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

// Projects

pub async fn projects_list(ops: &Operations, json: bool) -> Result<()> {
    let projects = ops.list_projects().await?;
    if json {
        println!("{}", output::projects_json(&projects)?);
        return Ok(());
    }
    if projects.is_empty() {
        println!("no projects");
    }
    for project in &projects {
        println!("{}", output::project_line(project));
    }
    Ok(())
}

pub async fn projects_get(ops: &Operations, id: &str, json: bool) -> Result<()> {
    let project = ops.get_project(id).await?;
    if json {
        println!("{}", output::project_json(&project)?);
    } else {
        println!("{}", output::project_line(&project));
    }
    Ok(())
}

pub async fn projects_data(ops: &Operations, id: &str, json: bool) -> Result<()> {
    let data = ops.project_data(id).await?;
    if json {
        let tasks: Vec<output::TaskView> = data.tasks.iter().map(output::TaskView::from).collect();
        let value = serde_json::json!({
            "project": data.project.as_ref().map(output::ProjectView::from),
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    if let Some(project) = &data.project {
        println!("{}", output::project_line(project));
    }
    print_tasks(&data.tasks, "no tasks");
    Ok(())
}

pub async fn projects_create(ops: &Operations, new: NewProject, json: bool) -> Result<()> {
    let project = ops.create_project(new).await?;
    if json {
        println!("{}", output::project_json(&project)?);
    } else {
        println!("created {}", output::project_line(&project));
    }
    Ok(())
}

pub async fn projects_update(ops: &Operations, id: &str, update: ProjectUpdate, json: bool) -> Result<()> {
    let project = ops.update_project(id, update).await?;
    if json {
        println!("{}", output::project_json(&project)?);
    } else {
        println!("updated {}", output::project_line(&project));
    }
    Ok(())
}

pub async fn projects_delete(ops: &Operations, id: &str) -> Result<()> {
    let id = ops.delete_project(id).await?;
    println!("deleted project {}", id);
    Ok(())
}

// Tasks

/// Task subcommands with their inputs already checked, so malformed input
/// fails before any configuration is read or request is made.
pub enum TaskCommand {
    List { project: Option<String> },
    Get { id: String, project: Option<String> },
    Add(NewTask),
    Update { id: String, project: Option<String>, update: TaskUpdate },
    Complete { id: String, project: Option<String> },
    Delete { id: String, project: Option<String> },
    Search(SearchFilter),
    Due { days: i64 },
    Priority,
}

impl TaskCommand {
    pub fn from_cli(command: TaskCommands) -> Result<Self> {
        let parsed = match command {
            TaskCommands::List { project } => TaskCommand::List { project },
            TaskCommands::Get { id, project } => TaskCommand::Get { id, project },
            TaskCommands::Add {
                title,
                project,
                fields,
            } => {
                let TaskFieldArgs {
                    content,
                    due,
                    priority,
                    tags,
                    reminder,
                } = fields;
                let new = NewTask {
                    title: title.join(" "),
                    project,
                    content,
                    due,
                    priority,
                    tags: tags.as_deref().map(parse_tags),
                    reminder,
                };
                new.payload()?;
                TaskCommand::Add(new)
            }
            TaskCommands::Update {
                id,
                project,
                title,
                fields,
            } => {
                let update = TaskUpdate {
                    title,
                    content: fields.content,
                    due: fields.due,
                    priority: fields.priority,
                    tags: fields.tags.as_deref().map(parse_tags),
                    reminder: fields.reminder,
                };
                update.payload()?;
                TaskCommand::Update {
                    id,
                    project,
                    update,
                }
            }
            TaskCommands::Complete { id, project } => TaskCommand::Complete { id, project },
            TaskCommands::Delete { id, project } => TaskCommand::Delete { id, project },
            TaskCommands::Search {
                keyword,
                tags,
                priority,
            } => {
                let keyword = keyword.join(" ");
                let filter = SearchFilter {
                    keyword: (!keyword.trim().is_empty()).then_some(keyword),
                    tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
                    priority,
                };
                filter.priority_level()?;
                TaskCommand::Search(filter)
            }
            TaskCommands::Due { days } => {
                if days < 0 {
                    return Err(TickError::Validation("days cannot be negative".to_string()));
                }
                TaskCommand::Due { days }
            }
            TaskCommands::Priority => TaskCommand::Priority,
        };

        match &parsed {
            TaskCommand::Get { id, .. }
            | TaskCommand::Update { id, .. }
            | TaskCommand::Complete { id, .. }
            | TaskCommand::Delete { id, .. }
                if id.trim().is_empty() =>
            {
                Err(TickError::Validation("task id cannot be empty".to_string()))
            }
            _ => Ok(parsed),
        }
    }
}

pub async fn run_task_command(ops: &Operations, command: TaskCommand, json: bool) -> Result<()> {
    match command {
        TaskCommand::List { project } => {
            let tasks = ops.list_tasks(project.as_deref()).await?;
            emit_tasks(&tasks, json, "no tasks")
        }
        TaskCommand::Get { id, project } => {
            let task = ops.get_task(&id, project.as_deref()).await?;
            if json {
                println!("{}", output::task_json(&task)?);
            } else {
                println!("{}", output::task_detail(&task));
            }
            Ok(())
        }
        TaskCommand::Add(new) => {
            let task = ops.create_task(new).await?;
            if json {
                println!("{}", output::task_json(&task)?);
            } else {
                println!("created {}", output::task_line(&task));
            }
            Ok(())
        }
        TaskCommand::Update {
            id,
            project,
            update,
        } => {
            let task = ops.update_task(&id, project.as_deref(), update).await?;
            if json {
                println!("{}", output::task_json(&task)?);
            } else {
                println!("updated {}", output::task_line(&task));
            }
            Ok(())
        }
        TaskCommand::Complete { id, project } => {
            let target = ops.complete_task(&id, project.as_deref()).await?;
            println!("completed {}", target.task_id);
            Ok(())
        }
        TaskCommand::Delete { id, project } => {
            let target = ops.delete_task(&id, project.as_deref()).await?;
            println!("deleted {}", target.task_id);
            Ok(())
        }
        TaskCommand::Search(filter) => {
            let tasks = ops.search(&filter).await?;
            emit_tasks(&tasks, json, "no matching tasks")
        }
        TaskCommand::Due { days } => {
            let tasks = ops.due_within(days).await?;
            emit_tasks(&tasks, json, &format!("nothing due within {} days", days))
        }
        TaskCommand::Priority => {
            let tasks = ops.high_priority().await?;
            emit_tasks(&tasks, json, "no high-priority tasks")
        }
    }
}

fn emit_tasks(tasks: &[Task], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", output::tasks_json(tasks)?);
    } else {
        print_tasks(tasks, empty);
    }
    Ok(())
}

fn print_tasks(tasks: &[Task], empty: &str) {
    if tasks.is_empty() {
        println!("{}", empty);
    }
    for task in tasks {
        println!("{}", output::task_line(task));
    }
}
