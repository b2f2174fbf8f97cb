//! Candidate extraction - turning a free-text posting into a structured record
//!
//! This crate holds the language-model side of the candidates pipeline:
//! - Chat-completions wire types and the `LlmClient` seam (`llm`)
//! - An OpenAI-compatible client for OpenAI and Ollama (`openai`)
//! - The forced `Data` function schema and its validation (`schema`)
//! - Few-shot examples loaded from disk (`few_shot`) and the prompt built from them (`prompt`)
//! - The extractor that runs the prompt over unparsed messages (`extractor`)
//!
//! The model only fills in the record. Whether a message counts as parsed is
//! decided by the extractor: anything other than a `Data` call carrying at
//! least one valid candidate is a failure and the message is retried later.

pub mod extractor;
pub mod few_shot;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod schema;

pub use extractor::{extract_candidate, CandidateExtractor, ExtractionError};
pub use few_shot::{load_examples, FewShotError, FewShotExample};
pub use llm::{LlmClient, LlmError};
pub use openai::OpenAiCompatibleClient;
