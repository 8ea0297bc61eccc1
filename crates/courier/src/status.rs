// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status` and `courier history` command implementations.
//!
//! Both talk to a running gateway over its REST API. `status` falls back
//! gracefully when nothing is listening.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::time::Duration;

use courier_config::model::CourierConfig;
use courier_core::{CourierError, Message};
use serde::{Deserialize, Serialize};

/// Body of GET /api/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub active_users: Vec<String>,
    pub queued_messages: BTreeMap<String, usize>,
    pub total_chats: usize,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub endpoint: String,
    #[serde(flatten)]
    pub engine: Option<EngineStatus>,
}

/// Body of GET /api/messages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationBody {
    chat_key: String,
    messages: Vec<Message>,
}

/// Base URL a local client should use to reach the configured gateway.
///
/// Wildcard bind addresses are not connectable, so they map to loopback.
fn base_url(config: &CourierConfig) -> String {
    let host = match config.gateway.host.as_str() {
        "0.0.0.0" => "127.0.0.1",
        "::" | "[::]" => "[::1]",
        other => other,
    };
    format!("http://{host}:{}", config.gateway.port)
}

fn http_client() -> Result<reqwest::Client, CourierError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to create HTTP client: {e}")))
}

/// Run the `courier status` command.
pub async fn run_status(config: &CourierConfig, json: bool, plain: bool) -> Result<(), CourierError> {
    let endpoint = format!("{}/api/status", base_url(config));
    let client = http_client()?;

    let engine = match client.get(&endpoint).send().await {
        Ok(resp) if resp.status().is_success() => Some(resp.json::<EngineStatus>().await.map_err(
            |e| CourierError::Internal(format!("failed to parse status response: {e}")),
        )?),
        Ok(resp) => {
            tracing::debug!(status = %resp.status(), "status endpoint returned an error");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "status endpoint unreachable");
            None
        }
    };

    if json {
        let response = StatusResponse {
            running: engine.is_some(),
            endpoint,
            engine,
        };
        let rendered = serde_json::to_string_pretty(&response)
            .map_err(|e| CourierError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    match engine {
        Some(status) => print_status_running(&status, use_color),
        None => print_status_offline(&endpoint, use_color),
    }
    Ok(())
}

/// Run the `courier history` command.
pub async fn run_history(
    config: &CourierConfig,
    user1: &str,
    user2: &str,
    json: bool,
) -> Result<(), CourierError> {
    let endpoint = format!("{}/api/messages", base_url(config));
    let url = reqwest::Url::parse_with_params(&endpoint, &[("user1", user1), ("user2", user2)])
        .map_err(|e| CourierError::Internal(format!("invalid gateway URL {endpoint}: {e}")))?;
    let response = http_client()?
        .get(url)
        .send()
        .await
        .map_err(|e| CourierError::io(format!("failed to reach {endpoint}"), e))?;

    if !response.status().is_success() {
        return Err(CourierError::Internal(format!(
            "gateway answered {}",
            response.status()
        )));
    }

    let body: ConversationBody = response
        .json()
        .await
        .map_err(|e| CourierError::Internal(format!("failed to parse history response: {e}")))?;

    if json {
        let rendered = serde_json::to_string_pretty(&serde_json::json!({
            "chatKey": body.chat_key,
            "messages": body.messages,
        }))
        .map_err(|e| CourierError::Internal(format!("failed to render history: {e}")))?;
        println!("{rendered}");
    } else {
        println!("conversation {} ({} messages)", body.chat_key, body.messages.len());
        for message in &body.messages {
            println!("{}", format_message(message));
        }
    }
    Ok(())
}

fn format_message(message: &Message) -> String {
    format!(
        "[{}] {} -> {}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M:%S"),
        message.from,
        message.to,
        message.content
    )
}

fn format_queues(queued: &BTreeMap<String, usize>) -> String {
    if queued.is_empty() {
        return "none".to_string();
    }
    queued
        .iter()
        .map(|(user, depth)| format!("{user}={depth}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_status_running(status: &EngineStatus, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✓".green(), "running".green());
    } else {
        println!("    State:    [OK] running");
    }

    println!("    Online:   {}", status.active_users.join(", "));
    println!("    Queued:   {}", format_queues(&status.queued_messages));
    println!("    Chats:    {}", status.total_chats);
    println!();
}

fn print_status_offline(endpoint: &str, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:    [FAIL] not running");
    }

    println!("    Endpoint: {endpoint}");
    println!();
    println!("  Start with: courier serve");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_host_maps_to_loopback() {
        let mut config = CourierConfig::default();
        config.gateway.host = "0.0.0.0".into();
        config.gateway.port = 9000;
        assert_eq!(base_url(&config), "http://127.0.0.1:9000");

        config.gateway.host = "chat.internal".into();
        assert_eq!(base_url(&config), "http://chat.internal:9000");
    }

    #[test]
    fn queues_format_sorted() {
        let mut queued = BTreeMap::new();
        queued.insert("carol".to_string(), 1);
        queued.insert("bob".to_string(), 3);
        assert_eq!(format_queues(&queued), "bob=3, carol=1");
        assert_eq!(format_queues(&BTreeMap::new()), "none");
    }

    #[test]
    fn message_line_names_both_sides() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "id": "msg-1",
            "from": "alice",
            "to": "bob",
            "content": "hi",
            "timestamp": "2026-03-01T12:30:00Z",
        }))
        .unwrap();
        assert_eq!(format_message(&message), "[2026-03-01 12:30:00] alice -> bob: hi");
    }

    #[test]
    fn status_response_flattens_engine_fields() {
        let response = StatusResponse {
            running: true,
            endpoint: "http://127.0.0.1:8080/api/status".into(),
            engine: Some(EngineStatus {
                active_users: vec!["alice".into()],
                queued_messages: BTreeMap::new(),
                total_chats: 2,
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["activeUsers"][0], "alice");
        assert_eq!(json["totalChats"], 2);
    }

    #[test]
    fn offline_status_has_no_engine_fields() {
        let response = StatusResponse {
            running: false,
            endpoint: "http://127.0.0.1:8080/api/status".into(),
            engine: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["running"], false);
        assert!(json.get("totalChats").is_none());
    }
}
