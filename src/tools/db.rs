/// Item database tools: create, read, update, delete and list rows of the
/// `items` table.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};

use crate::clients::db::{Database, MAX_LIST_LIMIT};
use crate::core::error::ToolError;
use crate::core::server::{MCPTool, ToolFuture, ToolRegistry};
use crate::tools::{optional_i64, optional_str, required_i64, required_str};

const DEFAULT_LIST_LIMIT: i64 = 50;

fn id_property() -> Value {
    json!({ "type": "integer", "description": "Item id" })
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> MCPTool {
    MCPTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required
        }),
    }
}

/// Register a handler that runs `op` against the shared database.
fn register_op<F>(registry: &mut ToolRegistry, db: &Arc<Database>, tool: MCPTool, op: F)
where
    F: Fn(Arc<Database>, Value) -> ToolFuture + Send + Sync + 'static,
{
    let db = Arc::clone(db);
    registry.register(tool, Box::new(move |args: Value| op(Arc::clone(&db), args)));
}

pub fn register(registry: &mut ToolRegistry, db: &Arc<Database>) {
    register_op(
        registry,
        db,
        tool(
            "db_create_item",
            "Create a new item in the database",
            json!({
                "name": { "type": "string", "description": "Item name" },
                "content": { "type": "string", "description": "Item content" }
            }),
            &["name", "content"],
        ),
        |db, args| create(db, args).boxed(),
    );
    register_op(
        registry,
        db,
        tool(
            "db_get_item",
            "Fetch a single item by id",
            json!({ "id": id_property() }),
            &["id"],
        ),
        |db, args| get(db, args).boxed(),
    );
    register_op(
        registry,
        db,
        tool(
            "db_update_item",
            "Update the name and/or content of an item",
            json!({
                "id": id_property(),
                "name": { "type": "string", "description": "New name" },
                "content": { "type": "string", "description": "New content" }
            }),
            &["id"],
        ),
        |db, args| update(db, args).boxed(),
    );
    register_op(
        registry,
        db,
        tool(
            "db_delete_item",
            "Delete an item by id",
            json!({ "id": id_property() }),
            &["id"],
        ),
        |db, args| delete(db, args).boxed(),
    );
    register_op(
        registry,
        db,
        tool(
            "db_list_items",
            "List items, newest first",
            json!({
                "limit": {
                    "type": "integer",
                    "description": format!("Maximum number of items (default {DEFAULT_LIST_LIMIT}, max {MAX_LIST_LIMIT})")
                }
            }),
            &[],
        ),
        |db, args| list(db, args).boxed(),
    );
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn not_found(id: i64) -> ToolError {
    ToolError::NotFound(format!("item {id}"))
}

async fn create(db: Arc<Database>, args: Value) -> Result<Value, ToolError> {
    let name = required_str(&args, "name")?;
    let content = required_str(&args, "content")?;
    Ok(to_json(&db.create(name, content).await?))
}

async fn get(db: Arc<Database>, args: Value) -> Result<Value, ToolError> {
    let id = required_i64(&args, "id")?;
    let item = db.get(id).await?.ok_or_else(|| not_found(id))?;
    Ok(to_json(&item))
}

async fn update(db: Arc<Database>, args: Value) -> Result<Value, ToolError> {
    let id = required_i64(&args, "id")?;
    let name = optional_str(&args, "name")?;
    let content = optional_str(&args, "content")?;
    let item = db.update(id, name, content).await?.ok_or_else(|| not_found(id))?;
    Ok(to_json(&item))
}

async fn delete(db: Arc<Database>, args: Value) -> Result<Value, ToolError> {
    let id = required_i64(&args, "id")?;
    if !db.delete(id).await? {
        return Err(not_found(id));
    }
    Ok(json!(format!("Deleted item {id}")))
}

async fn list(db: Arc<Database>, args: Value) -> Result<Value, ToolError> {
    let limit = optional_i64(&args, "limit")?.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(to_json(&db.list(limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register(&mut registry, &Arc::new(Database::new("sqlite::memory:")));
        registry
    }

    async fn call(registry: &ToolRegistry, name: &str, args: Value) -> Result<Value, ToolError> {
        registry.call(name, args).await.unwrap()
    }

    #[tokio::test]
    async fn item_lifecycle() {
        let registry = registry();

        let created = call(&registry, "db_create_item", json!({"name": "todo", "content": "buy milk"}))
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        let updated = call(&registry, "db_update_item", json!({"id": id, "content": "buy oat milk"}))
            .await
            .unwrap();
        assert_eq!(updated["name"], "todo");
        assert_eq!(updated["content"], "buy oat milk");

        let listed = call(&registry, "db_list_items", json!({})).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let deleted = call(&registry, "db_delete_item", json!({"id": id})).await.unwrap();
        assert_eq!(deleted, json!(format!("Deleted item {id}")));

        let err = call(&registry, "db_get_item", json!({"id": id})).await.unwrap_err();
        assert_eq!(err.to_string(), format!("item {id} not found"));
    }

    #[tokio::test]
    async fn rejects_bad_arguments() {
        let registry = registry();

        let err = call(&registry, "db_get_item", json!({"id": "seven"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { name: "id", .. }));

        let err = call(&registry, "db_create_item", json!({"name": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter("content")));
    }
}
