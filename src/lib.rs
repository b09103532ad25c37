//! Retrieval-augmented legal assistant core for the LuatViet web app.
//!
//! The crate loads a JSON knowledge snapshot, chunks and embeds it into an
//! in-memory vector index, and answers Vietnamese legal questions over HTTP
//! by grounding an Ollama-served chat model on the retrieved passages.

pub mod core;
pub mod corpus;
pub mod engine;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
