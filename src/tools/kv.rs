/// Key-value tools: `kv_set` and `kv_get`.

use std::sync::Arc;

use futures_util::FutureExt;
use redis::RedisError;
use serde_json::{Value, json};

use crate::clients::kv::{KvCommands, KvStore};
use crate::core::error::ToolError;
use crate::core::server::{MCPTool, ToolHandler, ToolRegistry};
use crate::core::shared::Connector;
use crate::tools::required_str;

pub fn register<C>(registry: &mut ToolRegistry, store: &Arc<KvStore<C>>)
where
    C: Connector<Error = RedisError>,
    C::Client: KvCommands,
{
    let set_store = Arc::clone(store);
    let set_handler: ToolHandler = Box::new(move |args: Value| set(Arc::clone(&set_store), args).boxed());
    registry.register(
        MCPTool {
            name: "kv_set".to_string(),
            description: "Store a string value under a key in the key-value store".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key to write" },
                    "value": { "type": "string", "description": "Value to store" }
                },
                "required": ["key", "value"]
            }),
        },
        set_handler,
    );

    let get_store = Arc::clone(store);
    let get_handler: ToolHandler = Box::new(move |args: Value| get(Arc::clone(&get_store), args).boxed());
    registry.register(
        MCPTool {
            name: "kv_get".to_string(),
            description: "Read the value stored under a key; null if the key does not exist"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key to read" }
                },
                "required": ["key"]
            }),
        },
        get_handler,
    );
}

async fn set<C>(store: Arc<KvStore<C>>, args: Value) -> Result<Value, ToolError>
where
    C: Connector<Error = RedisError>,
    C::Client: KvCommands,
{
    let key = required_str(&args, "key")?;
    let value = required_str(&args, "value")?;
    store.set(key, value).await?;
    Ok(json!("OK"))
}

async fn get<C>(store: Arc<KvStore<C>>, args: Value) -> Result<Value, ToolError>
where
    C: Connector<Error = RedisError>,
    C::Client: KvCommands,
{
    let key = required_str(&args, "key")?;
    Ok(store.get(key).await?.map_or(Value::Null, Value::String))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::kv::RedisConnector;
    use crate::clients::kv::tests::MemoryConnector;
    use std::time::Duration;

    fn registry_with<C>(store: KvStore<C>) -> ToolRegistry
    where
        C: Connector<Error = RedisError>,
        C::Client: KvCommands,
    {
        let mut registry = ToolRegistry::new();
        register(&mut registry, &Arc::new(store));
        registry
    }

    #[tokio::test]
    async fn set_then_get() {
        let registry = registry_with(KvStore::new(MemoryConnector::default()));

        let ok = registry
            .call("kv_set", json!({"key": "a", "value": "1"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok, json!("OK"));

        let value = registry.call("kv_get", json!({"key": "a"})).await.unwrap().unwrap();
        assert_eq!(value, json!("1"));

        let missing = registry.call("kv_get", json!({"key": "b"})).await.unwrap().unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[tokio::test]
    async fn unreachable_store_reports_connect_failure() {
        let connector = RedisConnector::new("redis://127.0.0.1:1", Some(Duration::from_millis(500)));
        let registry = registry_with(KvStore::new(connector));

        let err = registry
            .call("kv_get", json!({"key": "a"}))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().starts_with("key-value store unavailable"));
    }
}
