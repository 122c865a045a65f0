//! # gqmd
//!
//! A local document indexing and retrieval engine.
//!
//! gqmd scans directories of text documents, stores each distinct body once
//! under its SHA-256 hash, keeps a full-text index in lockstep with a
//! catalog of `(collection, path)` entries, and optionally keeps an
//! embedding index for cosine-similarity search.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │  Registry  │──▶│   Scanner    │──▶│ Content + Catalog    │
//! │ name/root/ │   │ walk, match, │   │ + FTS5 (one txn per  │
//! │ pattern    │   │ hash, title  │   │ file)                │
//! └────────────┘   └──────────────┘   └─────────┬────────────┘
//!                                               │
//!                  ┌──────────────┐             │
//!                  │  embed_cmd   │──▶ Vector Index (out of band)
//!                  └──────────────┘             │
//!                                               ▼
//!                         search / vector / get / tools
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`error`] | Error taxonomy |
//! | [`config`] | TOML configuration |
//! | [`db`] | Index location and connection pool |
//! | [`migrate`] | Schema |
//! | [`models`] | Core data types |
//! | [`content`] | Content-addressable store |
//! | [`catalog`] | Document catalog with soft delete |
//! | [`fts`] | Full-text index |
//! | [`vector`] | Embedding storage and cosine top-k search |
//! | [`scanner`] | Directory scanner and include patterns |
//! | [`registry`] | Collection registry |
//! | [`get`] | Document retrieval |
//! | [`search`] | Combined lexical + semantic query |
//! | [`chunk`] | Paragraph chunker |
//! | [`embedding`] | Embedder capability |
//! | [`embed_cmd`] | Embedding pipeline |
//! | [`stats`] | Index status |
//! | [`tools`] | Named operation table |

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod content;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod error;
pub mod fts;
pub mod get;
pub mod migrate;
pub mod models;
pub mod registry;
pub mod scanner;
pub mod search;
pub mod stats;
pub mod tools;
pub mod vector;
