use std::path::Path;

use policypilot::cli::{
    commands::{ChatAction, Commands, IngestAction},
    run_cli,
};
use policypilot::config::DatabaseConfig;
use policypilot::db::{get_connection, DbService};
use policypilot::ingest::{self, Chunk, ChunkType};
use uuid::Uuid;

fn write_config(dir: &Path) -> String {
    let db_path = dir.join("chats.duckdb");
    let yaml = format!(
        r#"
server:
  host: "127.0.0.1"
  port: 0
database:
  path: "{}"
llm:
  provider: "deepseek"
  openai:
    api_base: "http://127.0.0.1:1"
    api_key: "sk-test"
    default_model: "deepseek-chat"
retrieval:
  embedding_url: "http://127.0.0.1:1/embed"
  pinecone:
    host: "http://127.0.0.1:1"
    api_key: "pc-test"
"#,
        db_path.display()
    );
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path.to_str().unwrap().to_string()
}

fn db(dir: &Path) -> DatabaseConfig {
    DatabaseConfig {
        path: dir.join("chats.duckdb").to_str().unwrap().to_string(),
    }
}

#[tokio::test]
async fn deleting_unknown_chat_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let missing = Uuid::new_v4();
    let err = run_cli(Commands::Chats { action: ChatAction::Delete { id: missing } }, config.clone())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("Chat {} not found", missing));

    let id = {
        let pool = get_connection(&db(dir.path())).unwrap();
        let conn = pool.lock().unwrap();
        DbService::insert_chat(&conn, "user-1", "Motor").unwrap().id
    };

    run_cli(Commands::Chats { action: ChatAction::Delete { id } }, config)
        .await
        .unwrap();

    let pool = get_connection(&db(dir.path())).unwrap();
    let conn = pool.lock().unwrap();
    assert!(DbService::get_chat(&conn, id).unwrap().is_none());
}

fn chunk(id: &str) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        company_id: "britam".to_string(),
        product_id: None,
        chunk_type: ChunkType::CompanyMetadata,
        raw_data: serde_json::Map::new(),
        text: "Britam is a composite insurance company.".to_string(),
    }
}

#[tokio::test]
async fn combine_twice_writes_the_same_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let data = dir.path().join("data");
    ingest::save_chunks(&[chunk("a"), chunk("b")], &data.join("britam_preprocessed.json")).unwrap();

    for _ in 0..2 {
        run_cli(
            Commands::Ingest {
                action: IngestAction::Combine { dir: data.clone(), output: None },
            },
            config.clone(),
        )
        .await
        .unwrap();
    }

    let combined = ingest::load_chunks(&data.join(ingest::COMBINED_FILE)).unwrap();
    let ids: Vec<_> = combined.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}
