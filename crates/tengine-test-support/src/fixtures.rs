//! Fake transformer scripts.
//!
//! Scripts are run as `/bin/sh <script> <args…>` so they never need the executable bit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tengine_core::CommandTemplate;

/// Text the failing script writes to stderr.
pub const FAILURE_STDERR: &str = "unreadable source content";

const COPY: &str = "cp \"$1\" \"$2\"\n";
const FAIL: &str = "echo \"unreadable source content\" >&2\nexit 3\n";
const SILENT: &str = "exit 0\n";
const SLOW: &str = "sleep 30\ncp \"$1\" \"$2\"\n";
const CRASH: &str = "kill -9 $$\n";
const ECHO_ARGS: &str = "for arg in \"$@\"; do last=\"$arg\"; done\nprintf '%s\\n' \"$@\" > \"$last\"\n";

/// A directory of installed fake transformer scripts.
#[derive(Debug)]
pub struct FakeTransformers {
    dir: TempDir,
}

impl FakeTransformers {
    /// Write every script into a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the scripts cannot be written.
    pub fn install() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        for (name, body) in [
            ("copy.sh", COPY),
            ("fail.sh", FAIL),
            ("silent.sh", SILENT),
            ("slow.sh", SLOW),
            ("crash.sh", CRASH),
            ("echo_args.sh", ECHO_ARGS),
        ] {
            fs::write(dir.path().join(name), format!("#!/bin/sh\n{body}"))?;
        }
        Ok(Self { dir })
    }

    /// Directory holding the scripts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Copies source to target.
    #[must_use]
    pub fn copy(&self) -> CommandTemplate {
        self.command("copy.sh", &["{source}", "{target}"])
    }

    /// Exits 3 after writing [`FAILURE_STDERR`].
    #[must_use]
    pub fn failing(&self) -> CommandTemplate {
        self.command("fail.sh", &["{source}", "{target}"])
    }

    /// Exits 0 without writing a target.
    #[must_use]
    pub fn silent(&self) -> CommandTemplate {
        self.command("silent.sh", &["{source}", "{target}"])
    }

    /// Sleeps far longer than any test timeout before copying.
    #[must_use]
    pub fn slow(&self) -> CommandTemplate {
        self.command("slow.sh", &["{source}", "{target}"])
    }

    /// Kills itself with SIGKILL.
    #[must_use]
    pub fn crashing(&self) -> CommandTemplate {
        self.command("crash.sh", &["{source}", "{target}"])
    }

    /// Writes its own arguments, one per line, into the target.
    #[must_use]
    pub fn echo_args(&self, args: &[&str]) -> CommandTemplate {
        let mut full: Vec<&str> = args.to_vec();
        full.push("{target}");
        self.command("echo_args.sh", &full)
    }

    fn command(&self, script: &str, args: &[&str]) -> CommandTemplate {
        let mut rendered = vec![self.script_path(script).to_string_lossy().into_owned()];
        rendered.extend(args.iter().map(|arg| (*arg).to_owned()));
        CommandTemplate {
            program: "/bin/sh".into(),
            args: rendered,
        }
    }

    fn script_path(&self, script: &str) -> PathBuf {
        self.dir.path().join(script)
    }
}
