use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use tracing::debug;

use crate::{CommandRunner, ProcessCommandRunner, VcsError, VcsResult};

const ORIGIN_HEAD_REF: &str = "refs/remotes/origin/HEAD";
const ORIGIN_PREFIX: &str = "refs/remotes/origin/";
const FALLBACK_BRANCHES: &[&str] = &["main", "master"];
const WORKTREES_SUFFIX: &str = "-worktrees";

/// Thin discipline over `git worktree` and branch resolution for one
/// repository. Worktrees live in a `{repo}-worktrees` sibling directory.
pub struct WorktreeManager<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    binary: String,
    repo_root: PathBuf,
}

impl WorktreeManager<ProcessCommandRunner> {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self::with_runner(ProcessCommandRunner, repo_root)
    }
}

impl<R: CommandRunner> WorktreeManager<R> {
    pub fn with_runner(runner: R, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: "git".to_owned(),
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The repository's default branch: origin's HEAD when set, otherwise
    /// the first of `main`/`master` that exists.
    pub fn default_branch(&self) -> VcsResult<String> {
        if let Ok(output) = self.run_git(&[
            OsString::from("symbolic-ref"),
            OsString::from(ORIGIN_HEAD_REF),
        ]) {
            let reference = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            if let Some(branch) = reference.strip_prefix(ORIGIN_PREFIX) {
                if !branch.is_empty() {
                    return Ok(branch.to_owned());
                }
            }
        }

        for candidate in FALLBACK_BRANCHES {
            if self.branch_exists(candidate)? {
                return Ok((*candidate).to_owned());
            }
        }

        Err(VcsError::Git(format!(
            "repository '{}' has neither an origin HEAD nor a main/master branch",
            self.repo_root.display()
        )))
    }

    /// Creates the branch from `base_branch` if it does not already exist
    /// and checks it out into a fresh worktree. Returns the absolute
    /// worktree path.
    pub fn create_worktree(&self, branch: &str, base_branch: &str) -> VcsResult<PathBuf> {
        validate_branch_name(branch)?;
        validate_branch_name(base_branch)?;

        let path = self.worktree_path(branch);
        if path.exists() {
            return Err(VcsError::WorktreeExists(path));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                VcsError::Git(format!(
                    "failed to create worktree base '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        if !self.branch_exists(branch)? {
            self.run_git(&[
                OsString::from("branch"),
                OsString::from(branch),
                OsString::from(base_branch),
            ])?;
        }

        self.run_git(&[
            OsString::from("worktree"),
            OsString::from("add"),
            path.as_os_str().to_owned(),
            OsString::from(branch),
        ])?;

        Ok(path)
    }

    /// Best-effort removal; a worktree that is already gone is not an error.
    pub fn remove_worktree(&self, path: &Path) {
        let result = self.run_git(&[
            OsString::from("worktree"),
            OsString::from("remove"),
            path.as_os_str().to_owned(),
        ]);
        if let Err(error) = result {
            debug!(path = %path.display(), %error, "worktree removal skipped");
        }
    }

    /// The sibling directory a branch's worktree resolves to.
    pub fn worktree_path(&self, branch: &str) -> PathBuf {
        let repo_name = self
            .repo_root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_owned());
        let base = self
            .repo_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.repo_root.clone());
        base.join(format!("{repo_name}{WORKTREES_SUFFIX}"))
            .join(sanitize_branch_component(branch))
    }

    fn branch_exists(&self, branch: &str) -> VcsResult<bool> {
        let output = self.run_git_raw(&[
            OsString::from("rev-parse"),
            OsString::from("--verify"),
            OsString::from(branch),
        ])?;
        Ok(output.status.success())
    }

    fn run_git(&self, args: &[OsString]) -> VcsResult<Output> {
        let output = self.run_git_raw(args)?;
        if output.status.success() {
            return Ok(output);
        }
        Err(command_failed(args, &output))
    }

    fn run_git_raw(&self, args: &[OsString]) -> VcsResult<Output> {
        let mut full_args = vec![OsString::from("-C"), self.repo_root.as_os_str().to_owned()];
        full_args.extend_from_slice(args);
        self.runner
            .run(&self.binary, &full_args)
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::NotFound => VcsError::Git(format!(
                    "git executable '{}' was not found in PATH",
                    self.binary
                )),
                _ => VcsError::Git(format!("failed to execute git: {error}")),
            })
    }
}

fn command_failed(args: &[OsString], output: &Output) -> VcsError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    let detail = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        format!("exit status {}", output.status)
    };
    let rendered = args
        .iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    VcsError::Git(format!("git {rendered}: {detail}"))
}

fn validate_branch_name(branch: &str) -> VcsResult<()> {
    let invalid = branch.is_empty()
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.chars().any(|c| c.is_whitespace() || c == '~' || c == '^' || c == ':');
    if invalid {
        return Err(VcsError::BranchInvalid(branch.to_owned()));
    }
    Ok(())
}

/// Branch names become directory names; whitespace and filesystem-unsafe
/// characters collapse to `-`.
pub fn sanitize_branch_component(branch: &str) -> String {
    branch
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '-'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        /// (needle contained in joined args, exit code, stdout, stderr)
        scripts: Vec<(&'static str, i32, &'static str, &'static str)>,
    }

    impl ScriptedRunner {
        fn with_scripts(scripts: Vec<(&'static str, i32, &'static str, &'static str)>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                scripts,
            }
        }

        fn recorded(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("read recorded calls")
                .iter()
                .map(|call| call.join(" "))
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, _program: &str, args: &[OsString]) -> std::io::Result<Output> {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| arg.to_string_lossy().to_string())
                .collect();
            let joined = rendered.join(" ");
            self.calls
                .lock()
                .expect("record call")
                .push(rendered);

            for (needle, code, stdout, stderr) in &self.scripts {
                if joined.contains(needle) {
                    return Ok(Output {
                        status: ExitStatus::from_raw(*code << 8),
                        stdout: stdout.as_bytes().to_vec(),
                        stderr: stderr.as_bytes().to_vec(),
                    });
                }
            }
            Ok(Output {
                status: ExitStatus::from_raw(0),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }

    fn manager(runner: ScriptedRunner) -> WorktreeManager<ScriptedRunner> {
        WorktreeManager::with_runner(runner, "/work/repo")
    }

    #[test]
    fn default_branch_comes_from_origin_head() {
        let manager = manager(ScriptedRunner::with_scripts(vec![(
            "symbolic-ref",
            0,
            "refs/remotes/origin/trunk\n",
            "",
        )]));
        assert_eq!(manager.default_branch().expect("default branch"), "trunk");
    }

    #[test]
    fn default_branch_falls_back_to_main_then_master() {
        let manager = manager(ScriptedRunner::with_scripts(vec![
            ("symbolic-ref", 1, "", "fatal: ref refs/remotes/origin/HEAD is not a symbolic ref"),
            ("rev-parse --verify main", 1, "", "fatal: Needed a single revision"),
            ("rev-parse --verify master", 0, "abc123\n", ""),
        ]));
        assert_eq!(manager.default_branch().expect("default branch"), "master");
    }

    #[test]
    fn default_branch_fails_when_nothing_resolves() {
        let manager = manager(ScriptedRunner::with_scripts(vec![
            ("symbolic-ref", 1, "", ""),
            ("rev-parse", 1, "", ""),
        ]));
        assert!(matches!(manager.default_branch(), Err(VcsError::Git(_))));
    }

    #[test]
    fn worktree_path_is_a_repo_sibling() {
        let manager = manager(ScriptedRunner::default());
        assert_eq!(
            manager.worktree_path("task/abc12345"),
            PathBuf::from("/work/repo-worktrees/task-abc12345")
        );
    }

    #[test]
    fn create_worktree_creates_missing_branch_from_base() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&repo).expect("create repo dir");

        let runner = ScriptedRunner::with_scripts(vec![(
            "rev-parse --verify task/abc12345",
            1,
            "",
            "fatal: Needed a single revision",
        )]);
        let manager = WorktreeManager::with_runner(runner, &repo);

        let path = manager
            .create_worktree("task/abc12345", "main")
            .expect("create worktree");
        assert!(path.ends_with("repo-worktrees/task-abc12345"));

        let calls = manager.runner.recorded();
        assert!(calls
            .iter()
            .any(|call| call.contains("branch task/abc12345 main")));
        assert!(calls
            .iter()
            .any(|call| call.contains("worktree add") && call.contains("task/abc12345")));
    }

    #[test]
    fn create_worktree_skips_branch_creation_when_it_exists() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&repo).expect("create repo dir");

        let runner = ScriptedRunner::default();
        let manager = WorktreeManager::with_runner(runner, &repo);

        manager
            .create_worktree("task/abc12345", "main")
            .expect("create worktree");
        let calls = manager.runner.recorded();
        assert!(!calls.iter().any(|call| call.contains("branch task/")));
    }

    #[test]
    fn create_worktree_refuses_existing_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let repo = dir.path().join("repo");
        let existing = dir.path().join("repo-worktrees").join("task-abc12345");
        fs::create_dir_all(&repo).expect("create repo dir");
        fs::create_dir_all(&existing).expect("create existing worktree dir");

        let manager = WorktreeManager::with_runner(ScriptedRunner::default(), &repo);
        assert!(matches!(
            manager.create_worktree("task/abc12345", "main"),
            Err(VcsError::WorktreeExists(_))
        ));
    }

    #[test]
    fn create_worktree_rejects_invalid_branches() {
        let manager = manager(ScriptedRunner::default());
        for bad in ["", "-oops", "a b", "a..b", "end/", "name.lock", "a~b"] {
            assert!(
                matches!(
                    manager.create_worktree(bad, "main"),
                    Err(VcsError::BranchInvalid(_))
                ),
                "branch {bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn remove_worktree_ignores_failures() {
        let manager = manager(ScriptedRunner::with_scripts(vec![(
            "worktree remove",
            1,
            "",
            "fatal: not a working tree",
        )]));
        manager.remove_worktree(Path::new("/work/repo-worktrees/gone"));
        assert!(manager
            .recorded_contains("worktree remove /work/repo-worktrees/gone"));
    }

    impl WorktreeManager<ScriptedRunner> {
        fn recorded_contains(&self, needle: &str) -> bool {
            self.runner
                .recorded()
                .iter()
                .any(|call| call.contains(needle))
        }
    }

    #[test]
    fn sanitization_collapses_unsafe_characters() {
        assert_eq!(
            sanitize_branch_component("task/fix login bug"),
            "task-fix-login-bug"
        );
        assert_eq!(sanitize_branch_component("a:b*c?d"), "a-b-c-d");
        assert_eq!(sanitize_branch_component("plain"), "plain");
    }

    #[test]
    fn every_call_targets_the_repository_root() {
        let manager = manager(ScriptedRunner::with_scripts(vec![(
            "symbolic-ref",
            0,
            "refs/remotes/origin/main\n",
            "",
        )]));
        manager.default_branch().expect("default branch");
        for call in manager.runner.recorded() {
            assert!(call.starts_with("-C /work/repo"), "call was: {call}");
        }
    }
}
