/// Todoist tool: `get_todays_tasks`.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};

use crate::clients::todoist::{TodoistClient, format_tasks_for_display};
use crate::core::error::ToolError;
use crate::core::server::{MCPTool, ToolHandler, ToolRegistry};

pub fn register(registry: &mut ToolRegistry, client: Option<Arc<TodoistClient>>) {
    let tool = MCPTool {
        name: "get_todays_tasks".to_string(),
        description: "Get all tasks due today from Todoist, sorted by priority".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    };

    let handler: ToolHandler = Box::new(move |_args: Value| todays_tasks(client.clone()).boxed());
    registry.register(tool, handler);
}

async fn todays_tasks(client: Option<Arc<TodoistClient>>) -> Result<Value, ToolError> {
    let client = client.ok_or(ToolError::NotConfigured("TODOIST_API_TOKEN"))?;

    let (tasks, projects) = futures_util::try_join!(client.get_todays_tasks(), client.get_projects())?;
    Ok(Value::String(format_tasks_for_display(&tasks, &projects)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry_with(client: Option<Arc<TodoistClient>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register(&mut registry, client);
        registry
    }

    #[tokio::test]
    async fn unconfigured_token_is_reported() {
        let registry = registry_with(None);
        let err = registry.call("get_todays_tasks", json!({})).await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "TODOIST_API_TOKEN is not configured");
    }

    #[tokio::test]
    async fn formats_tasks_with_project_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(query_param("filter", "today"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "7",
                "project_id": "p1",
                "content": "write report",
                "is_completed": false,
                "order": 1,
                "priority": 4,
                "url": "https://todoist.com/showTask?id=7",
                "created_at": "2024-01-15T10:00:00Z",
                "creator_id": "u1"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "p1",
                "name": "Work",
                "color": "blue",
                "order": 1,
                "is_shared": false,
                "is_favorite": false,
                "view_style": "list",
                "url": "https://todoist.com/showProject?id=p1"
            }])))
            .mount(&server)
            .await;

        let client = TodoistClient::new(reqwest::Client::new(), server.uri(), "secret");
        let registry = registry_with(Some(Arc::new(client)));

        let text = registry.call("get_todays_tasks", json!({})).await.unwrap().unwrap();
        let text = text.as_str().unwrap();
        assert!(text.contains("🔴 P1 write report"));
        assert!(text.contains("📁 Work"));
    }
}
