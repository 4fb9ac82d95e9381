/// Todoist REST client and task formatting for the `get_todays_tasks` tool.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.todoist.com/rest/v2";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Due {
    pub date: String,
    pub datetime: Option<String>,
    pub string: String,
    pub timezone: Option<String>,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub section_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub description: String,
    pub is_completed: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parent_id: Option<String>,
    pub order: i64,
    pub priority: u8,
    pub due: Option<Due>,
    pub url: String,
    #[serde(default)]
    pub comment_count: u32,
    pub created_at: String,
    pub creator_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    pub parent_id: Option<String>,
    pub order: i64,
    #[serde(default)]
    pub comment_count: u32,
    pub is_shared: bool,
    pub is_favorite: bool,
    pub view_style: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum TodoistError {
    #[error("Todoist API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub struct TodoistClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TodoistClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn request<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, TodoistError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "todoist request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TodoistError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    pub async fn get_tasks(&self, filter: Option<&str>) -> Result<Vec<Task>, TodoistError> {
        match filter {
            Some(filter) => self.request("/tasks", &[("filter", filter)]).await,
            None => self.request("/tasks", &[]).await,
        }
    }

    pub async fn get_projects(&self) -> Result<Vec<Project>, TodoistError> {
        self.request("/projects", &[]).await
    }

    pub async fn get_todays_tasks(&self) -> Result<Vec<Task>, TodoistError> {
        self.get_tasks(Some("today")).await
    }
}

fn priority_label(priority: u8) -> &'static str {
    match priority {
        4 => "🔴 P1",
        3 => "🟡 P2",
        2 => "🔵 P3",
        _ => "⚪ P4",
    }
}

fn due_label(due: Option<&Due>) -> String {
    let Some(due) = due else {
        return String::new();
    };

    match due.datetime.as_deref().and_then(clock_time) {
        Some(time) => format!(" ⏰ {time}"),
        None => " 📅 Today".to_string(),
    }
}

/// `h:mm AM/PM` in the timestamp's own offset. Floating times carry no offset.
fn clock_time(datetime: &str) -> Option<String> {
    const CLOCK: &str = "%-I:%M %p";

    if let Ok(parsed) = DateTime::parse_from_rfc3339(datetime) {
        return Some(parsed.format(CLOCK).to_string());
    }
    NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|parsed| parsed.format(CLOCK).to_string())
}

/// Render tasks as a numbered list, highest priority first.
pub fn format_tasks_for_display(tasks: &[Task], projects: &[Project]) -> String {
    if tasks.is_empty() {
        return "No tasks due today! 🎉".to_string();
    }

    let project_names: HashMap<&str, &str> = projects
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));

    let entries: Vec<String> = sorted
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let project = project_names
                .get(task.project_id.as_str())
                .copied()
                .unwrap_or("Unknown Project");
            let labels = if task.labels.is_empty() {
                String::new()
            } else {
                format!(" 🏷️ {}", task.labels.join(", "))
            };
            let description = if task.description.is_empty() {
                String::new()
            } else {
                format!("\n   📝 {}", task.description)
            };

            format!(
                "{}. {} {}{}\n   📁 {}{}{}",
                index + 1,
                priority_label(task.priority),
                task.content,
                due_label(task.due.as_ref()),
                project,
                labels,
                description
            )
        })
        .collect();

    format!(
        "📋 Today's Tasks ({} total):\n\n{}",
        tasks.len(),
        entries.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task(id: &str, content: &str, priority: u8, order: i64) -> Task {
        Task {
            id: id.to_string(),
            project_id: "p1".to_string(),
            section_id: None,
            content: content.to_string(),
            description: String::new(),
            is_completed: false,
            labels: Vec::new(),
            parent_id: None,
            order,
            priority,
            due: None,
            url: format!("https://todoist.com/showTask?id={id}"),
            comment_count: 0,
            created_at: "2024-01-15T10:00:00Z".to_string(),
            creator_id: "u1".to_string(),
        }
    }

    fn project(id: &str, name: &str) -> Project {
        Project {
            id: id.to_string(),
            name: name.to_string(),
            color: "red".to_string(),
            parent_id: None,
            order: 1,
            comment_count: 0,
            is_shared: false,
            is_favorite: false,
            view_style: "list".to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(format_tasks_for_display(&[], &[]), "No tasks due today! 🎉");
    }

    #[test]
    fn sorts_by_priority_then_order() {
        let tasks = vec![
            task("1", "low", 1, 1),
            task("2", "urgent later", 4, 2),
            task("3", "urgent first", 4, 1),
        ];
        let out = format_tasks_for_display(&tasks, &[project("p1", "Home")]);

        assert!(out.starts_with("📋 Today's Tasks (3 total):\n\n"));
        let first = out.find("1. 🔴 P1 urgent first").unwrap();
        let second = out.find("2. 🔴 P1 urgent later").unwrap();
        let third = out.find("3. ⚪ P4 low").unwrap();
        assert!(first < second && second < third);
        assert!(out.contains("📁 Home"));
    }

    #[test]
    fn renders_due_labels_and_description() {
        let mut timed = task("1", "standup", 3, 1);
        timed.project_id = "missing".to_string();
        timed.labels = vec!["work".to_string(), "daily".to_string()];
        timed.description = "bring notes".to_string();
        timed.due = Some(Due {
            date: "2024-01-15".to_string(),
            datetime: Some("2024-01-15T09:05:00Z".to_string()),
            string: "today at 9:05".to_string(),
            timezone: None,
            is_recurring: false,
        });

        let mut dated = task("2", "groceries", 2, 2);
        dated.due = Some(Due {
            date: "2024-01-15".to_string(),
            datetime: None,
            string: "today".to_string(),
            timezone: None,
            is_recurring: false,
        });

        let out = format_tasks_for_display(&[timed, dated], &[]);
        assert!(out.contains(
            "1. 🟡 P2 standup ⏰ 9:05 AM\n   📁 Unknown Project 🏷️ work, daily\n   📝 bring notes"
        ));
        assert!(out.contains("2. 🔵 P3 groceries 📅 Today\n   📁 Unknown Project"));
    }

    #[tokio::test]
    async fn fetches_todays_tasks_with_filter_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(query_param("filter", "today"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "7",
                "project_id": "p1",
                "content": "write report",
                "is_completed": false,
                "labels": [],
                "order": 1,
                "priority": 4,
                "url": "https://todoist.com/showTask?id=7",
                "comment_count": 0,
                "created_at": "2024-01-15T10:00:00Z",
                "creator_id": "u1"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = TodoistClient::new(reqwest::Client::new(), server.uri(), "secret");
        let tasks = client.get_todays_tasks().await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content, "write report");
        assert!(tasks[0].due.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let client = TodoistClient::new(reqwest::Client::new(), server.uri(), "bad");
        match client.get_projects().await.unwrap_err() {
            TodoistError::Api { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "Forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
