use crate::error::{Result, TickError};
use crate::oauth::TokenManager;
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

pub const STATUS_COMPLETED: i32 = 2;

/// Treat an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub project_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub priority: i32,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: i32,
    #[serde(default, deserialize_with = "nullable")]
    pub reminders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<String>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default, deserialize_with = "nullable")]
    pub tasks: Vec<Task>,
}

/// Body for task create/update. Unset fields are left out of the JSON
/// entirely so the server keeps its current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// The TickTick open API, one method per endpoint.
#[async_trait]
pub trait TickTickApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn get_project(&self, project_id: &str) -> Result<Project>;
    async fn get_project_data(&self, project_id: &str) -> Result<ProjectData>;
    async fn create_project(&self, payload: &ProjectPayload) -> Result<Project>;
    async fn update_project(&self, project_id: &str, payload: &ProjectPayload) -> Result<Project>;
    async fn delete_project(&self, project_id: &str) -> Result<()>;
    async fn get_task(&self, project_id: &str, task_id: &str) -> Result<Task>;
    async fn create_task(&self, payload: &TaskPayload) -> Result<Task>;
    async fn update_task(&self, task_id: &str, payload: &TaskPayload) -> Result<Task>;
    async fn complete_task(&self, project_id: &str, task_id: &str) -> Result<()>;
    async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<()>;
}

/// Build `base/seg1/seg2/...`, percent-encoding every segment so an ID can
/// never escape its position in the path.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TickError::Other(format!("cannot use {} as an API base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
    tokens: TokenManager,
}

impl HttpApi {
    pub fn new(client: reqwest::Client, base: &str, tokens: TokenManager) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| TickError::Other(format!("invalid API base URL '{}': {}", base, e)))?;
        Ok(Self {
            client,
            base,
            tokens,
        })
    }

    async fn request<B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String> {
        let url = endpoint(&self.base, segments)?;
        let token = self.tokens.get_valid_access_token().await?;
        tracing::debug!(%method, %url, "api request");

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TickError::ApiRequestFailed {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let text = self.request::<()>(Method::GET, segments, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let text = self.request(Method::POST, segments, Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TickTickApi for HttpApi {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json(&["project"]).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.get_json(&["project", project_id]).await
    }

    async fn get_project_data(&self, project_id: &str) -> Result<ProjectData> {
        self.get_json(&["project", project_id, "data"]).await
    }

    async fn create_project(&self, payload: &ProjectPayload) -> Result<Project> {
        self.post_json(&["project"], payload).await
    }

    async fn update_project(&self, project_id: &str, payload: &ProjectPayload) -> Result<Project> {
        self.post_json(&["project", project_id], payload).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.request::<()>(Method::DELETE, &["project", project_id], None)
            .await
            .map(|_| ())
    }

    async fn get_task(&self, project_id: &str, task_id: &str) -> Result<Task> {
        self.get_json(&["project", project_id, "task", task_id]).await
    }

    async fn create_task(&self, payload: &TaskPayload) -> Result<Task> {
        self.post_json(&["task"], payload).await
    }

    async fn update_task(&self, task_id: &str, payload: &TaskPayload) -> Result<Task> {
        self.post_json(&["task", task_id], payload).await
    }

    async fn complete_task(&self, project_id: &str, task_id: &str) -> Result<()> {
        self.request::<()>(
            Method::POST,
            &["project", project_id, "task", task_id, "complete"],
            None,
        )
        .await
        .map(|_| ())
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<()> {
        self.request::<()>(Method::DELETE, &["project", project_id, "task", task_id], None)
            .await
            .map(|_| ())
    }
}
