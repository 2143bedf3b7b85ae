//! In-memory stand-ins for the token store, the OAuth grants and the API,
//! plus a loopback HTTP server for exercising the real clients.

use crate::api::{Project, ProjectData, ProjectPayload, Task, TaskPayload, TickTickApi};
use crate::error::{Result, TickError};
use crate::oauth::TokenGrant;
use crate::token::{now_millis, TokenSet, TokenStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<TokenSet>>,
}

impl MemoryTokenStore {
    pub fn new(initial: Option<TokenSet>) -> Self {
        Self {
            token: Mutex::new(initial),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenSet>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn save(&self, token: &TokenSet) -> Result<()> {
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn load(&self) -> Result<Option<TokenSet>> {
        (**self).load()
    }

    fn save(&self, token: &TokenSet) -> Result<()> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

#[derive(Default)]
pub struct FakeGrant {
    pub refreshes: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl TokenGrant for FakeGrant {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TickError::TokenExchangeFailed("HTTP 400: invalid_grant".to_string()));
        }
        Ok(TokenSet {
            access_token: format!("code:{}", code),
            refresh_token: "refresh-1".to_string(),
            expires_at: now_millis() + 3_600_000,
            token_type: "bearer".to_string(),
            stored_at: now_millis(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TickError::TokenRefreshFailed("HTTP 400: invalid_grant".to_string()));
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(TokenSet {
            access_token: "refreshed-access".to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: now_millis() + 3_600_000,
            token_type: "bearer".to_string(),
            stored_at: now_millis(),
        })
    }
}

#[async_trait]
impl<T: TokenGrant + ?Sized> TokenGrant for Arc<T> {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        (**self).refresh(refresh_token).await
    }
}

pub fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {}", id),
        ..Default::default()
    }
}

pub fn task(id: &str, title: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

/// Scripted API: a fixed project listing, per-project task lists, projects
/// that fail on fetch, and a log of every call made.
#[derive(Default)]
pub struct FakeApi {
    projects: Mutex<Vec<Project>>,
    tasks: Mutex<HashMap<String, Vec<Task>>>,
    failing: Mutex<HashSet<String>>,
    revoked: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    pub task_payloads: Mutex<Vec<TaskPayload>>,
    pub project_payloads: Mutex<Vec<ProjectPayload>>,
}

impl FakeApi {
    pub fn new(projects: Vec<Project>) -> Arc<Self> {
        Arc::new(Self {
            projects: Mutex::new(projects),
            ..Default::default()
        })
    }

    pub fn with_tasks(self: Arc<Self>, project_id: &str, tasks: Vec<Task>) -> Arc<Self> {
        let tasks = tasks
            .into_iter()
            .map(|mut t| {
                t.project_id = project_id.to_string();
                t
            })
            .collect();
        self.tasks.lock().unwrap().insert(project_id.to_string(), tasks);
        self
    }

    pub fn failing(self: Arc<Self>, project_id: &str) -> Arc<Self> {
        self.failing.lock().unwrap().insert(project_id.to_string());
        self
    }

    /// Fetches for this project fail as if the refresh token had been revoked.
    pub fn revoked(self: Arc<Self>, project_id: &str) -> Arc<Self> {
        self.revoked.lock().unwrap().insert(project_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, project_id: &str) -> Result<()> {
        if self.revoked.lock().unwrap().contains(project_id) {
            return Err(TickError::TokenRefreshFailed("HTTP 400: invalid_grant".to_string()));
        }
        if self.failing.lock().unwrap().contains(project_id) {
            return Err(TickError::ApiRequestFailed {
                status: 500,
                body: format!("boom: {}", project_id),
            });
        }
        Ok(())
    }

    fn find_task(&self, project_id: &str, task_id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .unwrap()
            .get(project_id)
            .and_then(|tasks| tasks.iter().find(|t| t.id == task_id).cloned())
            .ok_or_else(|| TickError::ApiRequestFailed {
                status: 404,
                body: "task not found".to_string(),
            })
    }
}

#[async_trait]
impl TickTickApi for FakeApi {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.record("projects".to_string());
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.record(format!("project:{}", project_id));
        self.check(project_id)?;
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| TickError::ApiRequestFailed {
                status: 404,
                body: "project not found".to_string(),
            })
    }

    async fn get_project_data(&self, project_id: &str) -> Result<ProjectData> {
        self.record(format!("data:{}", project_id));
        self.check(project_id)?;
        Ok(ProjectData {
            project: None,
            tasks: self
                .tasks
                .lock()
                .unwrap()
                .get(project_id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn create_project(&self, payload: &ProjectPayload) -> Result<Project> {
        self.record("create_project".to_string());
        self.project_payloads.lock().unwrap().push(payload.clone());
        Ok(Project {
            id: "newproject000001".to_string(),
            name: payload.name.clone().unwrap_or_default(),
            color: payload.color.clone(),
            view_mode: payload.view_mode.clone(),
            kind: payload.kind.clone(),
            closed: false,
        })
    }

    async fn update_project(&self, project_id: &str, payload: &ProjectPayload) -> Result<Project> {
        self.record(format!("update_project:{}", project_id));
        self.check(project_id)?;
        self.project_payloads.lock().unwrap().push(payload.clone());
        Ok(Project {
            id: project_id.to_string(),
            name: payload.name.clone().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.record(format!("delete_project:{}", project_id));
        self.check(project_id)
    }

    async fn get_task(&self, project_id: &str, task_id: &str) -> Result<Task> {
        self.record(format!("task:{}/{}", project_id, task_id));
        self.check(project_id)?;
        self.find_task(project_id, task_id)
    }

    async fn create_task(&self, payload: &TaskPayload) -> Result<Task> {
        self.record("create_task".to_string());
        self.task_payloads.lock().unwrap().push(payload.clone());
        Ok(Task {
            id: "newtask000000001".to_string(),
            project_id: payload.project_id.clone().unwrap_or_default(),
            title: payload.title.clone().unwrap_or_default(),
            content: payload.content.clone().unwrap_or_default(),
            due_date: payload.due_date.clone(),
            priority: payload.priority.unwrap_or_default(),
            tags: payload.tags.clone().unwrap_or_default(),
            reminders: payload.reminders.clone().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn update_task(&self, task_id: &str, payload: &TaskPayload) -> Result<Task> {
        self.record(format!("update_task:{}", task_id));
        self.task_payloads.lock().unwrap().push(payload.clone());
        let project_id = payload.project_id.clone().unwrap_or_default();
        self.check(&project_id)?;
        let mut task = self.find_task(&project_id, task_id)?;
        if let Some(title) = &payload.title {
            task.title = title.clone();
        }
        if let Some(priority) = payload.priority {
            task.priority = priority;
        }
        Ok(task)
    }

    async fn complete_task(&self, project_id: &str, task_id: &str) -> Result<()> {
        self.record(format!("complete:{}/{}", project_id, task_id));
        self.check(project_id)
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<()> {
        self.record(format!("delete:{}/{}", project_id, task_id));
        self.check(project_id)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

struct Route {
    method: String,
    path: String,
    status: u16,
    body: String,
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// One-request-per-connection HTTP/1.1 server on 127.0.0.1. Canned
/// responses are matched on method and path; anything else gets a 404.
pub struct MockServer {
    base: String,
    state: MockState,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = MockState::default();
        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, state).await;
                });
            }
        });
        Self { base, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: &str) {
        self.state.routes.lock().unwrap().push(Route {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn serve_one(mut stream: TcpStream, state: MockState) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line
        .next()
        .unwrap_or_default()
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + length);
    let body = String::from_utf8_lossy(&buf[header_end..end]).to_string();

    let (status, reply) = state
        .routes
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.method == method && r.path == path)
        .map(|r| (r.status, r.body.clone()))
        .unwrap_or((404, "no route".to_string()));
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body,
    });

    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reply.len(),
        reply
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
