pub mod commands;

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use uuid::Uuid;

use crate::cli::commands::{ChatAction, Commands, IngestAction};
use crate::config::AppConfig;
use crate::db::{get_connection, service::DbService, DbPool};
use crate::ingest;
use crate::rag::{AnswerRequest, Assistant};
use crate::retrieval::{HttpEmbedder, PineconeIndex};

pub type CliResult = Result<(), Box<dyn Error>>;

fn lock(pool: &DbPool) -> Result<std::sync::MutexGuard<'_, duckdb::Connection>, Box<dyn Error>> {
    pool.lock().map_err(|_| "database lock poisoned".into())
}

pub async fn run_cli(command: Commands, config_path: String) -> CliResult {
    let config = AppConfig::load(&config_path)?;

    match command {
        Commands::Serve => Err("serve is handled by the server entry point".into()),
        Commands::Chats { action } => run_chats(action, &config),
        Commands::Ingest { action } => run_ingest(action, &config).await,
        Commands::Ask { chat, user } => run_repl(chat, user, &config).await,
    }
}

fn run_chats(action: ChatAction, config: &AppConfig) -> CliResult {
    let pool = get_connection(&config.database)?;
    let conn = lock(&pool)?;

    match action {
        ChatAction::Create { user, name } => {
            let chat = DbService::insert_chat(&conn, &user, &name)?;
            println!("Created chat: {} ({})", chat.chat_name, chat.id);
        }
        ChatAction::List { user } => {
            let chats = DbService::list_chats(&conn, &user, 50, 0)?;
            if chats.is_empty() {
                println!("No chats found.");
            } else {
                println!("{:<38} | {:<20} | {}", "ID", "Updated At", "Name");
                println!("{:-<38}-+-{:-<20}-+-{:-<20}", "", "", "");
                for c in chats {
                    println!(
                        "{:<38} | {:<20} | {}",
                        c.id.to_string(),
                        c.updated_at.format("%Y-%m-%d %H:%M:%S"),
                        c.chat_name
                    );
                }
            }
        }
        ChatAction::Rename { id, name } => {
            if DbService::rename_chat(&conn, id, &name)? {
                println!("Renamed chat {} to {}", id, name);
            } else {
                return Err(format!("Chat {} not found", id).into());
            }
        }
        ChatAction::Delete { id } => {
            if DbService::get_chat(&conn, id)?.is_none() {
                return Err(format!("Chat {} not found", id).into());
            }
            DbService::delete_chat(&conn, id)?;
            println!("Deleted chat {}", id);
        }
        ChatAction::Export { id, path } => {
            let chat = DbService::get_chat(&conn, id)?
                .ok_or_else(|| format!("Chat {} not found", id))?;
            let messages = DbService::get_messages(&conn, id, 1000, 0)?;

            let export_path = path.unwrap_or_else(|| format!("chat_{}.txt", id).into());
            let mut file = std::fs::File::create(&export_path)?;

            writeln!(file, "Chat: {}", chat.chat_name)?;
            writeln!(file, "ID: {}", chat.id)?;
            writeln!(file, "User: {}", chat.user_id)?;
            writeln!(file, "Created At: {}", chat.created_at)?;
            writeln!(file, "---")?;
            for m in messages {
                writeln!(file, "[{}]: {}", m.role.as_str().to_uppercase(), m.content)?;
                writeln!(file, "---")?;
            }

            println!("Chat exported to: {}", export_path.display());
        }
    }

    Ok(())
}

async fn run_ingest(action: IngestAction, config: &AppConfig) -> CliResult {
    match action {
        IngestAction::Chunk { input, output } => {
            let output = output.unwrap_or_else(|| ingest::preprocessed_path(&input));
            let chunks = ingest::preprocess_file(&input, &output)?;
            println!("Wrote {} chunks to {}", chunks.len(), output.display());
        }
        IngestAction::Combine { dir, output } => {
            let output = output.unwrap_or_else(|| dir.join(ingest::COMBINED_FILE));
            let chunks = ingest::combine(&dir, &output)?;
            ingest::save_chunks(&chunks, &output)?;
            println!("Combined {} chunks into {}", chunks.len(), output.display());
        }
        IngestAction::Upload { path, batch_size } => {
            let chunks = ingest::load_chunks(Path::new(&path))?;
            let embedder = HttpEmbedder::new(config.retrieval.embedding_url.clone());
            let index = PineconeIndex::from_config(&config.retrieval.pinecone);
            let written = ingest::upload(&chunks, &embedder, &index, batch_size).await?;
            println!("Upserted {} of {} chunks", written, chunks.len());
        }
    }

    Ok(())
}

async fn run_repl(chat: Option<Uuid>, user: Option<String>, config: &AppConfig) -> CliResult {
    let pool = get_connection(&config.database)?;
    let assistant = Assistant::from_config(config, pool)
        .ok_or("Failed to initialize LLM provider from config")?;

    println!("--- PolicyPilot Terminal ---");
    match chat {
        Some(id) => println!("Continuing chat: {}", id),
        None => println!("Stateless session (pass --chat to keep history)"),
    }
    println!("Type /regenerate to redo the last answer, /exit to quit.");
    println!("----------------------------");

    let stdin = io::stdin();
    loop {
        print!("\nYou> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let text = input.trim();

        if text.is_empty() {
            continue;
        }
        if text == "/exit" || text == "/quit" {
            break;
        }
        if text == "/regenerate" {
            match chat {
                Some(id) => match assistant.regenerate(id, user.as_deref()).await {
                    Ok(response) => println!("PolicyPilot> {}", response.answer),
                    Err(e) => eprintln!("Error: {}", e),
                },
                None => eprintln!("Error: /regenerate needs --chat"),
            }
            continue;
        }

        let request = AnswerRequest {
            query: text.to_string(),
            chat_id: chat,
            user_id: user.clone(),
        };

        match assistant.answer(request).await {
            Ok(response) => {
                println!("PolicyPilot> {}", response.answer);
                println!("({} sources)", response.sources.len());
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
