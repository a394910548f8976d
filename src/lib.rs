//! # Research Tree
//!
//! Grows a hierarchical research article from one query. The article is a
//! tree of sections; each section collects retrieved evidence chunks and
//! questions, and clusters of novel questions become sub-sections.
//!
//! The engine itself lives in [`research_tree_core`]. This crate is the
//! native shell around it: configuration, SQLite persistence, the HTTP
//! collaborator client, logging, and the `rtree` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│  ResearchEngine  │──▶│ SqliteStore  │
//! │ (rtree)  │   │  (core crate)    │   │ trees + regs │
//! └──────────┘   └────────┬─────────┘   └──────────────┘
//!                         │
//!                         ▼
//!                ┌──────────────────┐
//!                │ HttpCollaborator │  search / questions / write / title
//!                └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rtree init
//! rtree create "How do black holes form and evaporate?"
//! rtree expand <session> root
//! rtree deepen <session> root
//! rtree render <session>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`collaborators`] | HTTP retrieval and generation client |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`session_cmd`] | Session-level commands |
//! | [`grow_cmd`] | Collaborator-backed commands |

pub mod collaborators;
pub mod config;
pub mod db;
pub mod grow_cmd;
pub mod logging;
pub mod migrate;
pub mod session_cmd;
pub mod sqlite_store;
