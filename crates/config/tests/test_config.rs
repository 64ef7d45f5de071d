//! Tests for Config serialization, deserialization, and core functionality

use taskpilot_config::{
    AgentSettings, BackendConfig, Config, ConfigError, McpServerConfig, Overrides,
    Strategy,
};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.backend.host, "http://localhost:11434");
    assert_eq!(config.backend.model, "qwen2.5-coder:7b");
    assert_eq!(config.backend.context_length, 8192);
    assert_eq!(config.backend.temperature, 0.2);

    assert_eq!(config.agent.strategy, Strategy::ToolCalling);
    assert_eq!(config.agent.max_iterations, 50);
    assert_eq!(config.agent.max_tool_rounds, 25);
    assert_eq!(config.agent.max_consecutive_failures, 8);
    assert_eq!(config.agent.command_timeout_secs, 60);
    assert_eq!(config.agent.sandbox_timeout_secs, 30);
    assert_eq!(config.agent.interpreter, "python3");

    assert!(config.mcp_servers.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_json_uses_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.backend.context_length, 8192);
    assert_eq!(config.agent.interpreter, "python3");
}

#[test]
fn test_partial_json_keeps_other_defaults() {
    let json = r#"{
        "backend": { "model": "llama3.1" },
        "agent": { "strategy": "code-emission", "max_iterations": 3 }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.backend.model, "llama3.1");
    assert_eq!(config.backend.host, "http://localhost:11434");
    assert_eq!(config.agent.strategy, Strategy::CodeEmission);
    assert_eq!(config.agent.max_iterations, 3);
    assert_eq!(config.agent.max_tool_rounds, 25);
}

#[test]
fn test_mcp_servers_parse() {
    let json = r#"{
        "mcp_servers": {
            "fs": { "command": "npx", "args": ["-y", "server-filesystem", "."], "env": { "DEBUG": "1" } }
        }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    let fs = &config.mcp_servers["fs"];
    assert_eq!(fs.command, "npx");
    assert_eq!(fs.args, vec!["-y", "server-filesystem", "."]);
    assert_eq!(fs.env.get("DEBUG").map(String::as_str), Some("1"));
}

#[test]
fn test_strategy_from_str() {
    assert_eq!("tool-calling".parse::<Strategy>().unwrap(), Strategy::ToolCalling);
    assert_eq!("CODE-EMISSION".parse::<Strategy>().unwrap(), Strategy::CodeEmission);
    assert_eq!("code".parse::<Strategy>().unwrap(), Strategy::CodeEmission);
    assert!("telepathy".parse::<Strategy>().is_err());
}

#[test]
fn test_strategy_display_matches_serde() {
    for strategy in [Strategy::ToolCalling, Strategy::CodeEmission] {
        let json = serde_json::to_string(&strategy).unwrap();
        assert_eq!(json, format!("\"{}\"", strategy));
    }
}

#[test]
fn test_apply_overrides() {
    let mut config = Config::default();
    config
        .apply_overrides(Overrides {
            model: Some("mistral".to_string()),
            host: Some("http://gpu-box:11434".to_string()),
            context_length: Some(32768),
            strategy: Some(Strategy::CodeEmission),
        })
        .unwrap();

    assert_eq!(config.backend.model, "mistral");
    assert_eq!(config.backend.host, "http://gpu-box:11434");
    assert_eq!(config.backend.context_length, 32768);
    assert_eq!(config.agent.strategy, Strategy::CodeEmission);
}

#[test]
fn test_apply_overrides_empty_is_noop() {
    let mut config = Config::default();
    config.apply_overrides(Overrides::default()).unwrap();
    assert_eq!(config.backend.model, BackendConfig::default().model);
}

#[test]
fn test_apply_overrides_validates() {
    let mut config = Config::default();
    let result = config.apply_overrides(Overrides {
        context_length: Some(10),
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_zero_limits() {
    let mut config = Config::default();
    config.agent = AgentSettings {
        max_tool_rounds: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_iterations() {
    let mut config = Config::default();
    config.agent.max_iterations = 0;

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("loop limits"));
}

#[test]
fn test_resolve_mcp_by_name() {
    let mut config = Config::default();
    config.mcp_servers.insert(
        "git".to_string(),
        McpServerConfig {
            command: "uvx".to_string(),
            args: vec!["mcp-server-git".to_string()],
            env: Default::default(),
        },
    );

    let (name, server) = config.resolve_mcp("git").unwrap();
    assert_eq!(name, "git");
    assert_eq!(server.command, "uvx");
}

#[test]
fn test_resolve_mcp_literal_command() {
    let config = Config::default();

    let (name, server) = config
        .resolve_mcp("/usr/local/bin/weather-server --units metric")
        .unwrap();
    assert_eq!(name, "weather-server");
    assert_eq!(server.command, "/usr/local/bin/weather-server");
    assert_eq!(server.args, vec!["--units", "metric"]);
}

#[test]
fn test_resolve_mcp_blank_selector() {
    let config = Config::default();
    assert!(config.resolve_mcp("   ").is_none());
}

#[tokio::test]
async fn test_save_and_load_roundtrip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.backend.model = "phi4".to_string();
    config.agent.strategy = Strategy::CodeEmission;
    config.save_to(&path).await.unwrap();

    let loaded = Config::load_from(&path).await.unwrap();
    assert_eq!(loaded.backend.model, "phi4");
    assert_eq!(loaded.agent.strategy, Strategy::CodeEmission);
}

#[tokio::test]
async fn test_load_missing_file_returns_defaults() {
    let dir = temp_dir();
    let config = Config::load_from(&dir.path().join("absent.json"))
        .await
        .unwrap();
    assert_eq!(config.backend.context_length, 8192);
}

#[tokio::test]
async fn test_load_required_missing_file() {
    let dir = temp_dir();
    let path = dir.path().join("absent.json");

    match Config::load_required(&path).await {
        Err(ConfigError::NotFound(missing)) => assert_eq!(missing, path),
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_load_required_existing_file() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, r#"{"backend": {"model": "mine"}}"#)
        .await
        .unwrap();

    let config = Config::load_required(&path).await.unwrap();
    assert_eq!(config.backend.model, "mine");
}
