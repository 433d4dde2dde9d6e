//! Dispatch table: route an actionable transcript to its skill target.
//!
//! Runs synchronously on the recognition thread.  Child processes get the
//! capture groups as positional arguments; dynamic modules get a
//! NULL-terminated C argv of `[full match, groups 1..]`.

use std::ffi::CString;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::process::Command;

use libloading::Library;
use regex::{Captures, Regex};

use crate::skills::loader::RunFn;

/// Entry-point symbol every skill module exports.
pub(crate) const RUN_SYMBOL: &[u8] = b"run\0";

// ---------------------------------------------------------------------------
// Skill / SkillTarget
// ---------------------------------------------------------------------------

pub enum SkillTarget {
    /// Spawn the executable and wait for it to exit.
    ChildProcess { path: PathBuf },
    /// Call the `run` symbol in a library loaded at discovery time.
    DynamicModule { library: Library },
}

pub struct Skill {
    pub name: String,
    /// Full-string anchored pattern from the `.re` file.
    pub pattern: Regex,
    pub target: SkillTarget,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Routing seam between the recognition loop and skill execution.
pub trait Dispatch: Send {
    /// Route `utterance` to the first matching skill.  Returns the matched
    /// skill's name, or `None` when nothing matched (a no-op, not an
    /// error).
    fn dispatch(&self, utterance: &str) -> Option<String>;
}

/// Skills in dispatch-precedence order (pattern file name).
pub struct SkillSet {
    skills: Vec<Skill>,
}

impl SkillSet {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self { skills }
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }
}

impl Dispatch for SkillSet {
    fn dispatch(&self, utterance: &str) -> Option<String> {
        for skill in &self.skills {
            if let Some(captures) = skill.pattern.captures(utterance) {
                log::info!("skills: '{}' matched \"{utterance}\"", skill.name);
                skill.execute(&captures);
                return Some(skill.name.clone());
            }
        }
        log::debug!("skills: no pattern matched \"{utterance}\"");
        None
    }
}

impl Skill {
    /// Run the target.  Execution failures are logged and swallowed: one
    /// broken skill must not take the recognition thread down.
    fn execute(&self, captures: &Captures<'_>) {
        match &self.target {
            SkillTarget::ChildProcess { path } => self.run_child(path, captures),
            SkillTarget::DynamicModule { library } => self.run_module(library, captures),
        }
    }

    /// Argument convention for executables: capture groups 1.. only, the
    /// full match (group 0) is excluded.  Non-participating groups become
    /// empty strings so argument positions stay stable.
    fn run_child(&self, path: &std::path::Path, captures: &Captures<'_>) {
        let args: Vec<&str> = (1..captures.len())
            .map(|i| captures.get(i).map_or("", |m| m.as_str()))
            .collect();

        let mut child = match Command::new(path).args(&args).spawn() {
            Ok(child) => child,
            Err(err) => {
                log::warn!("skills: failed to spawn {}: {err}", path.display());
                return;
            }
        };
        match child.wait() {
            Ok(status) if !status.success() => {
                log::warn!("skills: '{}' exited with {status}", self.name);
            }
            Ok(_) => {}
            Err(err) => log::warn!("skills: failed to wait on '{}': {err}", self.name),
        }
    }

    /// Argument convention for modules: `[full match, groups 1.., NULL]`.
    fn run_module(&self, library: &Library, captures: &Captures<'_>) {
        let strings: Vec<CString> = (0..captures.len())
            .map(|i| {
                let text = captures.get(i).map_or("", |m| m.as_str());
                // Capture text comes from a regex match, so it cannot
                // contain interior NULs.
                CString::new(text).unwrap_or_default()
            })
            .collect();
        let mut argv: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        argv.push(std::ptr::null());

        // Safety: the symbol was resolved against this library at
        // discovery, and `argv` outlives the call.
        unsafe {
            match library.get::<RunFn>(RUN_SYMBOL) {
                Ok(run) => run(argv.as_ptr()),
                Err(err) => log::warn!("skills: '{}' lost its run symbol: {err}", self.name),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn skill(name: &str, pattern: &str, target: SkillTarget) -> Skill {
        Skill {
            name: name.to_string(),
            pattern: Regex::new(&format!("^(?:{pattern})$")).unwrap(),
            target,
        }
    }

    /// Shell script that appends its arguments to a marker file, so tests
    /// can observe both that the child ran and what argv it received.  The
    /// script name is derived from the marker so skills sharing one temp
    /// directory keep distinct targets.
    fn script_target(dir: &Path, marker: &Path) -> SkillTarget {
        let stem = marker.file_name().unwrap().to_string_lossy();
        let path = dir.join(format!("{stem}-script"));
        fs::write(
            &path,
            format!("#!/bin/sh\necho \"$@\" >> {}\n", marker.display()),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        SkillTarget::ChildProcess { path }
    }

    #[test]
    fn first_matching_skill_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first_marker = dir.path().join("first");
        let second_marker = dir.path().join("second");

        let set = SkillSet::new(vec![
            skill("first", "lights .*", script_target(dir.path(), &first_marker)),
            skill(
                "second",
                "lights on",
                script_target(dir.path(), &second_marker),
            ),
        ]);

        assert_eq!(set.dispatch("lights on").as_deref(), Some("first"));
        assert!(first_marker.exists());
        assert!(!second_marker.exists());
    }

    #[test]
    fn no_match_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let set = SkillSet::new(vec![skill(
            "lights",
            "lights (on|off)",
            script_target(dir.path(), &marker),
        )]);

        assert_eq!(set.dispatch("what time is it"), None);
        assert!(!marker.exists());
    }

    #[test]
    fn child_receives_groups_without_full_match() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("args");
        let set = SkillSet::new(vec![skill(
            "lights",
            "turn (on|off) the (\\w+)",
            script_target(dir.path(), &marker),
        )]);

        set.dispatch("turn off the lamp");

        let recorded = fs::read_to_string(&marker).unwrap();
        // Group 0 ("turn off the lamp") must not appear as an argument.
        assert_eq!(recorded.trim(), "off lamp");
    }

    #[test]
    fn optional_group_becomes_empty_argument() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("args");
        let set = SkillSet::new(vec![skill(
            "timer",
            "set a timer(?: for (\\d+))? minutes?",
            script_target(dir.path(), &marker),
        )]);

        set.dispatch("set a timer minutes");
        let recorded = fs::read_to_string(&marker).unwrap();
        assert_eq!(recorded.trim(), "");
    }

    #[test]
    fn spawn_failure_does_not_panic_and_still_counts_as_dispatched() {
        let set = SkillSet::new(vec![skill(
            "ghost",
            "do the thing",
            SkillTarget::ChildProcess {
                path: PathBuf::from("/nonexistent/skill-binary"),
            },
        )]);

        // The match succeeded even though execution could not start.
        assert_eq!(set.dispatch("do the thing").as_deref(), Some("ghost"));
    }

    #[test]
    fn empty_set_never_matches() {
        let set = SkillSet::new(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.dispatch("anything at all"), None);
    }
}
