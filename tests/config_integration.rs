use aisdk_stream::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;

const ARGS: [&str; 1] = ["aisdk-stream"];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for key in [
            "AISDK_SERVER__PORT",
            "AISDK_CHAT__MAX_RECURSION_DEPTH",
            "AISDK_LLM__MODEL",
            "CONFIG_FILE",
            "HOST",
            "PORT",
            "LLM_BASE_URL",
            "LLM_MODEL",
            "LLM_API_KEY",
            "TOOL_LATENCY_MS",
            "LOG_JSON",
        ] {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.chat.max_recursion_depth, 5);
    assert_eq!(config.chat.tool_latency_ms, 2000);
    assert_eq!(config.chat.system_prompt.as_deref(), Some("You are a helpful assistant."));
    assert!(!config.log.json);
    assert!(config.prompt.is_none());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("AISDK_SERVER__PORT", "9090");
        env::set_var("AISDK_CHAT__MAX_RECURSION_DEPTH", "2");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.chat.max_recursion_depth, 2);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("aisdk.yaml");
    fs::write(
        &file_path,
        r"
server:
  port: 7070
llm:
  model: gpt-4o-mini
",
    )
    .expect("Failed to write temp config");

    unsafe {
        env::set_var("CONFIG_FILE", &file_path);
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.llm.model, "gpt-4o-mini");

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_wins_over_env_and_file() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("aisdk.toml");
    fs::write(&file_path, "[server]\nport = 7070\n").expect("Failed to write temp config");

    unsafe {
        env::set_var("AISDK_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args([
        "aisdk-stream",
        "--config",
        file_path.to_str().unwrap(),
        "--port",
        "5050",
        "--prompt",
        "What is 40+2?",
    ])
    .expect("Failed to load config");

    assert_eq!(config.server.port, 5050);
    assert_eq!(config.prompt.as_deref(), Some("What is 40+2?"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["aisdk-stream", "--config", "/nonexistent/aisdk.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "config.yaml";
    fs::write(cwd_path, "server:\n  port: 6060\n").expect("Failed to write ./config.yaml");

    let config = AppConfig::load_from_args(ARGS);
    fs::remove_file(cwd_path).unwrap();

    assert_eq!(config.expect("Failed to load config").server.port, 6060);
}
