//! # scanalyze
//!
//! Upload a document or photo, ask a question about it, get an answer back
//! from a vision language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file(s)
//!  │
//!  ├─ 1. Input      read a local path or download a URL
//!  ├─ 2. Accept     drop types outside the accept set (image/*, application/pdf)
//!  ├─ 3. Transcode  images → ≤1200 px JPEG q80 (spawn_blocking)
//!  ├─ 4. Limit      reject payloads still above max size (20 MB)
//!  ├─ 5. Preview    data: URI for images
//!  ├─ 6. Submit     prompt + first file → Analyzer (VLM via edgequake-llm)
//!  └─ 7. Result     clipboard text or analysis-result.txt
//! ```
//!
//! A [`Session`] holds the working set and at most one analysis request.
//! Upload and analysis progress are simulated by cancellable timers, and
//! every state change can be observed through a [`SessionObserver`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanalyze::{AnalyzerConfig, LlmAnalyzer, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let analyzer = LlmAnalyzer::from_config(AnalyzerConfig::default())?;
//!     let session = Session::new(SessionConfig::default(), Arc::new(analyzer));
//!
//!     let report = session.admit_inputs(&["invoice.pdf"]).await?;
//!     for err in &report.rejected {
//!         eprintln!("{err}");
//!     }
//!
//!     let request = session.submit("What is the total amount due?").await?;
//!     match request.result() {
//!         Some(text) => println!("{text}"),
//!         None => eprintln!("{}", request.error_message().unwrap_or("no result")),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanalyze` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scanalyze = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod export;
pub mod file;
pub mod intake;
pub mod observer;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{Analyzer, LlmAnalyzer};
pub use config::{AcceptMap, AnalyzerConfig, AnalyzerConfigBuilder, SessionConfig, SessionConfigBuilder};
pub use error::{AnalysisError, IntakeError, ScanError, SubmitBlock, ANALYSIS_FAILED_MESSAGE};
pub use export::RESULT_FILE_NAME;
pub use file::{FileId, FileItem, FileSummary, RawFile};
pub use observer::{NoopObserver, ObserverRef, SessionObserver};
pub use pipeline::input::resolve_input;
pub use pipeline::preview::Preview;
pub use progress::{ProgressHandle, ProgressSimulator};
pub use session::{AdmitReport, AnalysisRequest, AnalysisStatus, Session, SessionSnapshot};
