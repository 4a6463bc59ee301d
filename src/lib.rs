pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod retrieval;
