//! OpenAI-compatible HTTP backend for every collaborator service.
//!
//! Works with any server implementing the chat completions API:
//! - Ollama (`http://localhost:11434`)
//! - vLLM, llama.cpp server, LM Studio
//! - hosted OpenAI-compatible endpoints

pub mod backend;
pub mod prompts;
pub mod reply;

pub use backend::HttpBackend;
