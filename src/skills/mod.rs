//! Regex-routed skill dispatch.
//!
//! # Layout
//!
//! A skills directory pairs pattern files with targets by file stem:
//!
//! ```text
//! skills/
//! ├── lights.re      ← first line: aria turn (on|off) the lights?
//! ├── lights         ← executable sibling → spawned as a child process
//! ├── timer.re
//! └── timer.so       ← dynamic module → C ABI `run` entry point
//! ```
//!
//! Discovery ([`load_skills`]) runs once at startup; dispatch
//! ([`SkillSet`]) runs on the recognition thread after each actionable
//! transcript.  Patterns are tried in pattern-file-name order and the
//! first full-string match wins.

pub mod dispatch;
pub mod loader;

use thiserror::Error;

pub use dispatch::{Dispatch, Skill, SkillSet, SkillTarget};
pub use loader::load_skills;

// ---------------------------------------------------------------------------
// SkillError
// ---------------------------------------------------------------------------

/// Startup-time skill discovery failure.  A broken pattern file or an
/// unloadable module is a configuration error and aborts startup; a
/// pattern file with no target at all is merely skipped with a warning.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("cannot read skills directory {path}: {source}")]
    Scan {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot read pattern file {path}: {source}")]
    PatternRead {
        path: String,
        source: std::io::Error,
    },

    #[error("pattern file {path} is empty")]
    EmptyPattern { path: String },

    #[error("invalid regex in {path}: {source}")]
    BadPattern {
        path: String,
        source: regex::Error,
    },

    #[error("cannot load skill module {path}: {source}")]
    Module {
        path: String,
        source: libloading::Error,
    },
}
