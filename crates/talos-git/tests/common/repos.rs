//! Local git fixtures

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::process::Command;
use talos_git::{CommitAuthor, GitCli};
use tempfile::TempDir;

pub fn author() -> CommitAuthor {
    CommitAuthor {
        name: "Talos".into(),
        email: "talos@localhost".into(),
    }
}

/// The git client, or `None` when git is not installed
pub fn git() -> Option<GitCli> {
    GitCli::new().ok()
}

fn run(dir: &Utf8Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Seed")
        .env("GIT_AUTHOR_EMAIL", "seed@localhost")
        .env("GIT_COMMITTER_NAME", "Seed")
        .env("GIT_COMMITTER_EMAIL", "seed@localhost")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// A bare remote with one commit on `main`
pub struct Remote {
    temp: TempDir,
    pub bare: Utf8PathBuf,
}

impl Remote {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap().to_owned();
        let bare = root.join("remote.git");
        let seed = root.join("seed");

        fs::create_dir_all(&bare).unwrap();
        run(&bare, &["init", "--bare", "--initial-branch=main"]);
        fs::create_dir_all(&seed).unwrap();
        run(&seed, &["init", "--initial-branch=main"]);
        fs::write(seed.join("Dockerfile"), "FROM nginx:1.25\n").unwrap();
        run(&seed, &["add", "--all"]);
        run(&seed, &["commit", "-m", "seed"]);
        run(&seed, &["remote", "add", "origin", bare.as_str()]);
        run(&seed, &["push", "origin", "main"]);

        Self { temp, bare }
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.bare)
    }

    /// A fresh directory path under the fixture root
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8Path::from_path(self.temp.path()).unwrap().join(name)
    }

    /// Commit `content` to `file` on main from a separate clone
    pub fn advance(&self, file: &str, content: &str) {
        let other = self.path(&format!("advance-{}", file.replace('/', "-")));
        run(
            Utf8Path::from_path(self.temp.path()).unwrap(),
            &["clone", "--quiet", self.bare.as_str(), other.as_str()],
        );
        fs::write(other.join(file), content).unwrap();
        run(&other, &["add", "--all"]);
        run(&other, &["commit", "-m", "advance"]);
        run(&other, &["push", "origin", "main"]);
    }

    /// Content of `file` at `branch` in the remote
    pub fn show(&self, branch: &str, file: &str) -> String {
        let output = Command::new("git")
            .current_dir(&self.bare)
            .args(["show", &format!("{}:{}", branch, file)])
            .output()
            .unwrap();
        String::from_utf8(output.stdout).unwrap()
    }
}
