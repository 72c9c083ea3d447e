//! # creview
//!
//! Guideline-driven review of C source files.
//!
//! creview splits a `.c`/`.h` file into function-level chunks, retrieves the
//! coding guidelines most similar to each chunk by embedding similarity,
//! asks a language model to flag violations, and salvages the model's
//! structured findings into a JSON (and optionally HTML) report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌────────┐
//! │  source  │──▶│  chunk   │──▶│  matcher  │──▶│ model call│──▶│ report │
//! │ .c / .h  │   │ tree-sit │   │ embed+rank│   │ + extract │   │ JSON   │
//! └──────────┘   └──────────┘   └───────────┘   └───────────┘   └────────┘
//!                                     ▲
//!                              ┌──────┴──────┐
//!                              │ guidelines  │◀── HTTP editing API
//!                              └─────────────┘
//! ```
//!
//! Chunking, ranking, extraction, and prompts live in `creview-core`;
//! this crate supplies configuration, HTTP providers, file I/O, the
//! orchestrator, and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! creview chunks src/uart.c               # show chunk boundaries
//! creview match src/uart.c --top-k 3      # show retrieved guidelines
//! creview review src/uart.c --html out.html
//! creview agents src/uart.c --guidelines-dir guidelines/agents
//! creview serve                            # guideline editing API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, fastembed, hash) |
//! | [`llm`] | Model callers (OpenAI, Ollama) |
//! | [`source`] | `.c`/`.h` file reader |
//! | [`guidelines`] | JSON guideline store and agent subsets |
//! | [`review`] | Review orchestration and deduplication |
//! | [`report`] | JSON and HTML report sinks |
//! | [`server`] | Guideline editing HTTP API |

pub mod config;
pub mod embedding;
pub mod guidelines;
pub mod llm;
pub mod report;
pub mod review;
pub mod server;
pub mod source;
