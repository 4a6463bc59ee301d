use policypilot::config::{expand_env, AppConfig};
use std::io::Write;

const YAML: &str = r#"
server:
  host: "0.0.0.0"
  port: 9090
database:
  path: ":memory:"
auth:
  api_keys:
    - "${POLICYPILOT_TEST_KEY}"
    - "${POLICYPILOT_TEST_UNSET_KEY}"
llm:
  provider: "deepseek"
  openai:
    api_base: "https://api.deepseek.com"
    api_key: "${POLICYPILOT_TEST_DEEPSEEK}"
    default_model: "deepseek-chat"
retrieval:
  embedding_url: "http://localhost:8000/embed"
  pinecone:
    host: "insurers-abc.svc.pinecone.io"
    api_key: "pc"
"#;

#[test]
fn loads_yaml_with_defaults_and_expands_placeholders() {
    std::env::set_var("POLICYPILOT_TEST_KEY", "k-123");
    std::env::set_var("POLICYPILOT_TEST_DEEPSEEK", "sk-deep");
    std::env::remove_var("POLICYPILOT_TEST_UNSET_KEY");

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.server.port, 9090);
    // unset placeholders expand to nothing and are dropped
    assert_eq!(config.auth.api_keys, vec!["k-123".to_string()]);
    assert_eq!(config.llm.openai.as_ref().unwrap().api_key, "sk-deep");
    assert!(config.llm.ollama.is_none());
    assert_eq!(config.retrieval.top_k, 30);
    assert!(config.retrieval.pinecone.namespace.is_none());
    assert_eq!(config.chat.max_history_messages, 10);
    assert_eq!(config.chat.default_chat_name, "New Chat");
    assert_eq!(config.chat.title_max_chars, 40);
}

#[test]
fn expand_env_only_touches_whole_placeholders() {
    std::env::set_var("POLICYPILOT_TEST_HOST", "index.example");
    assert_eq!(expand_env("${POLICYPILOT_TEST_HOST}"), "index.example");
    assert_eq!(expand_env("https://${POLICYPILOT_TEST_HOST}"), "https://${POLICYPILOT_TEST_HOST}");
    assert_eq!(expand_env("plain"), "plain");
}
