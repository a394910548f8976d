//! # Research Tree Core
//!
//! Shared, I/O-free logic for Research Tree: the research-tree arena, the
//! question and chunk registries (behind the [`store::Store`] trait),
//! similarity clustering, the novelty filter, and the expand/deepen engine.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Retrieval, question
//! generation, and prose generation are reached through the collaborator
//! traits in [`collab`]; persistence goes through [`store::Store`].
//!
//! ## Data Flow
//!
//! ```text
//! query ──▶ create_tree ──▶ root node
//!                             │
//!             expand ◀────────┤  (retriever + question generator)
//!               │             │
//!               ▼             │
//!      chunks + expansion     │
//!          questions          │
//!               │             │
//!               ▼             ▼
//!      novelty filter ──▶ clustering ──▶ deepen ──▶ child nodes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`ids`] | Content-addressed chunk ids and normalized question keys |
//! | [`models`] | `Chunk`, `Question`, status and source enums, storage rows |
//! | [`tree`] | Arena-backed `ResearchTree` / `ResearchNode` with rank/level invariants |
//! | [`selector`] | Addressing nodes by id, section index, or display rank |
//! | [`cluster`] | Similarity functions and greedy single-pass clustering |
//! | [`novelty`] | Novelty of candidate questions against three baselines |
//! | [`deepen`] | Deepen planning and child creation |
//! | [`collab`] | Collaborator traits (retrieval, generation, titling) |
//! | [`store`] | Storage abstraction and in-memory implementation |
//! | [`repository`] | Save and two-pass load of whole trees |
//! | [`outline`] | Outline documents applied under the root |
//! | [`engine`] | The operations exposed to the service layer |
//! | [`serialize`] | Structured depth-first tree form |
//! | [`render`] | Markdown rendering |

pub mod cluster;
pub mod collab;
pub mod deepen;
pub mod engine;
pub mod error;
pub mod ids;
pub mod models;
pub mod novelty;
pub mod outline;
pub mod render;
pub mod repository;
pub mod selector;
pub mod serialize;
pub mod store;
pub mod tree;

pub use engine::{DeepenOutcome, EnginePolicy, ExpandOutcome, ResearchEngine};
pub use error::TreeError;
pub use models::{Chunk, NodeId, Question, QuestionId, QuestionSource, QuestionStatus, SessionId};
pub use selector::NodeSelector;
pub use tree::{ResearchNode, ResearchTree};
