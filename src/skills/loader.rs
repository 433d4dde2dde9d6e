//! Skill discovery: scan a directory for `.re` pattern files and resolve
//! each one's target.
//!
//! Resolution order for a pattern file `name.re`:
//!
//! 1. sibling `name` → child-process target
//! 2. sibling `name.so` → dynamic module (library loaded and the `run`
//!    symbol resolved here, so a broken module fails at startup rather
//!    than mid-dispatch)
//! 3. neither → warn and skip
//!
//! Descriptors come back sorted by pattern file name, which fixes the
//! dispatch precedence when several patterns could match one utterance.

use std::path::Path;

use libloading::Library;
use regex::Regex;

use crate::skills::dispatch::{Skill, SkillSet, SkillTarget, RUN_SYMBOL};
use crate::skills::SkillError;

/// Entry-point signature every skill module must export as `run`.
pub(crate) type RunFn = unsafe extern "C" fn(*const *const std::os::raw::c_char);

/// Scan `dir` and build the dispatch table.
///
/// # Errors
///
/// Unreadable or unparseable pattern files and unloadable `.so` targets
/// are fatal; see [`SkillError`].
pub fn load_skills(dir: impl AsRef<Path>) -> Result<SkillSet, SkillError> {
    let dir = dir.as_ref();
    let mut pattern_files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| SkillError::Scan {
            path: dir.display().to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "re"))
        .collect();
    pattern_files.sort();

    let mut skills = Vec::new();
    for pattern_path in &pattern_files {
        let pattern = read_pattern(pattern_path)?;
        let name = pattern_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        let exec_path = pattern_path.with_extension("");
        let module_path = pattern_path.with_extension("so");

        let target = if exec_path.is_file() {
            SkillTarget::ChildProcess { path: exec_path }
        } else if module_path.is_file() {
            SkillTarget::DynamicModule {
                library: load_module(&module_path)?,
            }
        } else {
            log::warn!(
                "skills: no target for pattern {} (looked for {} and {})",
                pattern_path.display(),
                exec_path.display(),
                module_path.display()
            );
            continue;
        };

        log::info!("skills: loaded '{}' ({})", name, pattern.as_str());
        skills.push(Skill {
            name,
            pattern,
            target,
        });
    }

    log::info!("skills: {} skill(s) registered", skills.len());
    Ok(SkillSet::new(skills))
}

/// First line of the pattern file, compiled with full-string anchors so a
/// transcript must match the whole pattern, not a substring.
fn read_pattern(path: &Path) -> Result<Regex, SkillError> {
    let text = std::fs::read_to_string(path).map_err(|source| SkillError::PatternRead {
        path: path.display().to_string(),
        source,
    })?;
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Err(SkillError::EmptyPattern {
            path: path.display().to_string(),
        });
    }
    Regex::new(&format!("^(?:{line})$")).map_err(|source| SkillError::BadPattern {
        path: path.display().to_string(),
        source,
    })
}

/// Load a module and prove the `run` symbol exists before dispatch ever
/// needs it.
fn load_module(path: &Path) -> Result<Library, SkillError> {
    let as_error = |source| SkillError::Module {
        path: path.display().to_string(),
        source,
    };
    // Safety: skill modules are part of the installed configuration; the
    // operator vouches for their initializers by placing them in the
    // skills directory.
    let library = unsafe { Library::new(path) }.map_err(as_error)?;
    unsafe { library.get::<RunFn>(RUN_SYMBOL) }.map_err(as_error)?;
    Ok(library)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
