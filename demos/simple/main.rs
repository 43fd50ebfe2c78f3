use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use fanflow::{DataResolver, FanflowError, Result, Task, TaskNode, TaskRequest, TaskTree};
use serde_json::{Value, json};
use tokio_stream::StreamExt;

/// In-memory resolver standing in for a REST backend.
struct TableResolver {
    routes: HashMap<String, Value>,
}

impl TableResolver {
    fn new() -> Self {
        let mut routes = HashMap::new();
        routes.insert("/persons?email=a@b.com".to_string(), json!([{"prsnId": 7, "email": "a@b.com"}]));
        routes.insert(
            "/persons/7/rre".to_string(),
            json!([{"rptrId": 2, "name": "Reporter Two"}, {"rptrId": 1, "name": "Reporter One"}]),
        );
        Self { routes }
    }

    fn lookup(
        &self,
        url: &str,
    ) -> Result<Value> {
        self.routes.get(url).cloned().ok_or_else(|| FanflowError::Resolver(format!("no route for {url}")))
    }
}

#[async_trait]
impl DataResolver for TableResolver {
    async fn get(
        &self,
        url: &str,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn get_array(
        &self,
        url: &str,
    ) -> Result<Vec<Value>> {
        match self.lookup(url)? {
            Value::Array(rows) => Ok(rows),
            single => Ok(vec![single]),
        }
    }

    async fn post(
        &self,
        url: &str,
        _body: &Value,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn put(
        &self,
        url: &str,
        _body: &Value,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn delete(
        &self,
        url: &str,
        _body: Option<&Value>,
    ) -> Result<Value> {
        self.lookup(url)
    }
}

#[tokio::main]
async fn main() {
    let resolver = Arc::new(TableResolver::new());

    let person_task = Task::new(
        "PersonTask",
        TaskRequest::get("/persons?email=${param1}").param("${param1}", ""),
        resolver.clone(),
    )
    .with_allow_many(false)
    .with_post_process(|mut response, _parent| {
        // unwrap the unique person row out of its array
        if let Some(Value::Array(rows)) = &response.result {
            if rows.len() == 1 {
                response.result = Some(rows[0].clone());
            }
        }
        response
    });

    let rre_task = Task::new(
        "RreTask",
        TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId"),
        resolver,
    )
    .with_post_process(|mut response, _parent| {
        if let Some(Value::Array(rows)) = &mut response.result {
            rows.sort_by_key(|row| row["rptrId"].as_i64().unwrap_or(0));
        }
        response
    });

    let root = TaskNode::new(person_task).with_child(TaskNode::new(rre_task));

    let mut tree = TaskTree::new(root);
    tree.set_root_param("${param1}", "a@b.com");

    let mut nodes = tree.run();
    while let Some(output) = nodes.next().await {
        println!("{} -> {}", output.key, serde_json::to_string_pretty(&output.response.result).unwrap());
    }
}
