// Integration test for the Noor Relay WebSocket server
// Validates connection acknowledgement, the ping/sync protocol, and the
// diagnostics endpoints against a real server process

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

// Server process handle for proper cleanup
struct ServerHandle {
    process: Child,
    port: u16,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.process.kill() {
            println!("Error during process termination: {}", e);
        }

        if let Err(e) = self.process.wait() {
            println!("Error waiting for process to finish: {}", e);
        }

        // Wait for the port to be freed
        thread::sleep(Duration::from_secs(1));

        println!("Server on port {} has been properly stopped", self.port);
    }
}

// Start the relay server for testing
fn start_server(port: u16) -> Result<ServerHandle, String> {
    let build_status = Command::new("cargo")
        .args(["build", "--bin", "noor_relay"])
        .status()
        .map_err(|e| format!("Failed to execute build command: {}", e))?;

    if !build_status.success() {
        return Err(format!(
            "Build process failed with exit code: {:?}",
            build_status.code()
        ));
    }

    println!("Starting server on port {}", port);

    let process = Command::new("cargo")
        .args(["run", "--bin", "noor_relay"])
        .env("NOOR_RELAY_HOST", "127.0.0.1")
        .env("NOOR_RELAY_PORT", port.to_string())
        .env("RUST_LOG", "debug")
        .spawn()
        .map_err(|e| format!("Failed to start relay server: {}", e))?;

    // Allow time for server initialization
    thread::sleep(Duration::from_secs(5));

    match reqwest::blocking::Client::new()
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(1))
        .send()
    {
        Ok(_) => println!("Server successfully booted on port {}", port),
        Err(e) => println!("Warning: Unable to verify server status: {}", e),
    }

    Ok(ServerHandle { process, port })
}

// Read the next text frame as JSON, with a timeout
async fn next_json<S>(ws_stream: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let frame = match tokio::time::timeout(Duration::from_secs(3), ws_stream.next()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) => panic!("Error receiving frame: {}", e),
        Ok(None) => panic!("Connection closed unexpectedly"),
        Err(_) => panic!("Timeout waiting for server frame"),
    };

    let text = match frame.into_text() {
        Ok(text) => text,
        Err(e) => panic!("Expected text frame: {}", e),
    };

    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => panic!("Failed to parse frame JSON: {}", e),
    }
}

#[test]
fn test_websocket_protocol() {
    let port = 8101;
    let _server = match start_server(port) {
        Ok(server) => server,
        Err(e) => {
            panic!("Failed to start test server: {}", e);
        }
    };

    let rt = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            panic!("Failed to create Tokio runtime: {}", e);
        }
    };

    rt.block_on(async {
        let url = format!("ws://127.0.0.1:{}/ws/it-parent", port);
        println!("Connecting to URL: {}", url);

        let (mut ws_stream, _) =
            match tokio::time::timeout(Duration::from_secs(5), connect_async(url)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => panic!("Failed to establish WebSocket connection: {}", e),
                Err(_) => panic!("WebSocket connection timeout after 5 seconds"),
            };

        println!("WebSocket connection established");

        // The first frame is the connection acknowledgement
        let ack = next_json(&mut ws_stream).await;
        assert_eq!(ack["type"], "connection", "Expected connection ack first");
        assert_eq!(ack["status"], "connected");
        assert_eq!(ack["user_id"], "it-parent");
        assert!(ack["timestamp"].is_string());

        // ping -> pong
        ws_stream
            .send(Message::Text(json!({"type": "ping"}).to_string()))
            .await
            .expect("Failed to send ping");
        let pong = next_json(&mut ws_stream).await;
        assert_eq!(pong["type"], "pong");
        assert!(pong["timestamp"].is_string());

        // Unknown message types must be ignored without closing the connection
        ws_stream
            .send(Message::Text(
                json!({"type": "future_feature", "payload": 1}).to_string(),
            ))
            .await
            .expect("Failed to send unknown-type message");

        // Malformed frames must be dropped without closing the connection
        ws_stream
            .send(Message::Text("this is not json".to_string()))
            .await
            .expect("Failed to send malformed frame");

        // The loop is still alive: ping again
        ws_stream
            .send(Message::Text(json!({"type": "ping"}).to_string()))
            .await
            .expect("Failed to send second ping");
        let pong = next_json(&mut ws_stream).await;
        assert_eq!(pong["type"], "pong");

        // sync_request -> sync_response with the provider payload
        ws_stream
            .send(Message::Text(json!({"type": "sync_request"}).to_string()))
            .await
            .expect("Failed to send sync_request");
        let sync = next_json(&mut ws_stream).await;
        assert_eq!(sync["type"], "sync_response");
        assert!(sync["data"].is_object());
        assert!(sync["timestamp"].is_string());

        if let Err(e) = ws_stream.close(None).await {
            println!("Warning: Failed to close WebSocket gracefully: {}", e);
        }
    });
}

#[test]
fn test_device_path_and_diagnostics_endpoints() {
    let port = 8102;
    let _server = match start_server(port) {
        Ok(server) => server,
        Err(e) => {
            panic!("Failed to start test server: {}", e);
        }
    };

    let rt = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            panic!("Failed to create Tokio runtime: {}", e);
        }
    };

    rt.block_on(async {
        // Health endpoint
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://127.0.0.1:{}/health", port))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("Failed to reach health endpoint");
        assert!(response.status().is_success());
        assert_eq!(response.text().await.unwrap(), "OK");

        // Connect on the device-scoped path
        let url = format!("ws://127.0.0.1:{}/ws/it-parent/device/tablet-1", port);
        let (mut ws_stream, _) =
            match tokio::time::timeout(Duration::from_secs(5), connect_async(url)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => panic!("Failed to establish WebSocket connection: {}", e),
                Err(_) => panic!("WebSocket connection timeout after 5 seconds"),
            };

        let ack = next_json(&mut ws_stream).await;
        assert_eq!(ack["type"], "connection");
        assert_eq!(ack["user_id"], "it-parent");

        // Info endpoint sees the live connection
        let response = client
            .get(format!("http://127.0.0.1:{}/info", port))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("Failed to reach info endpoint");
        assert!(response.status().is_success());
        let info: Value = response.json().await.expect("Info should be JSON");
        assert_eq!(info["name"], "noor-relay");
        assert_eq!(info["websocket_connections"], 1);

        if let Err(e) = ws_stream.close(None).await {
            println!("Warning: Failed to close WebSocket gracefully: {}", e);
        }
    });
}
