//! Pipeline stages between a user's file and the vision model.
//!
//! Each submodule implements one transformation step, so each can be tested
//! without the others.
//!
//! ## Data Flow
//!
//! ```text
//!            intake side                         analysis side
//! input ──▶ transcode ──▶ preview      encode / render ──▶ llm
//! (path/URL) (resize+JPEG) (data URI)   (base64, pdfium)   (VLM)
//! ```
//!
//! 1. [`input`]:     read a local path or download a URL into a `RawFile`
//! 2. [`transcode`]: downscale images to 1200 px and re-encode as JPEG
//! 3. [`preview`]:   build a `data:` URI for image payloads
//! 4. [`encode`]:    base64-wrap payloads and rendered pages for the API
//! 5. [`render`]:    rasterise leading PDF pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 6. [`llm`]:       drive the vision call with retry, backoff and timeout

pub mod encode;
pub mod input;
pub mod llm;
pub mod preview;
pub mod render;
pub mod transcode;
