//! Application payload recognition.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and constants (source of truth)
//! - `reader`: bounded byte access and framing conventions
//! - `parser`: domain-level decisions (no direct byte indexing)
//!
//! Parsers are pure and contain no I/O; reassembly and session layers own
//! state.

pub mod scene;
