//! JSON-RPC 2.0 framing for the agent server

use std::io::{self, BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use tend_core::Service;

use super::tools;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

/// The request/response loop over stdio
pub struct Server {
    service: Service,
}

impl Server {
    pub fn new(mut service: Service) -> Self {
        // Publishes happen off the request path, batched
        service.spawn_background_publisher();
        Self { service }
    }

    /// Serve until stdin closes
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        info!("server listening on stdio");

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request),
                Err(e) => {
                    JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e))
                }
            };

            let response_json = serde_json::to_string(&response)?;
            writeln!(stdout, "{}", response_json)?;
            stdout.flush()?;
        }

        // Clean shutdown: push anything the batch window still holds
        self.service.flush();
        info!("server stopped");
        Ok(())
    }

    pub fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "request");

        let params = request.params.clone().unwrap_or(Value::Null);
        let result = match request.method.as_str() {
            "initialize" => tools::initialize(),
            "tools/list" => tools::list_tools(),
            "tools/call" => tools::call_tool(&mut self.service, params),
            "resources/list" => tools::list_resources(),
            "resources/read" => tools::read_resource(&self.service, params),
            _ => {
                return JsonRpcResponse::error(
                    request.id,
                    -32601,
                    format!("Method not found: {}", request.method),
                )
            }
        };

        match result {
            Ok(result) => JsonRpcResponse::result(request.id, result),
            Err(e) => JsonRpcResponse::error(request.id, -32603, e),
        }
    }
}
