//! External simulator invocation.
//!
//! The driver runs one deck at a time through the configured simulator,
//! honoring two policies: `iterate` reuses result files that are newer than
//! their deck, and `cleanup` removes intermediate artifacts after a result
//! has been parsed. Cancellation and the optional wall-clock timeout share
//! one termination path: kill the child, keep the files.

use crate::dialect::Dialect;
use crate::error::SimError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reuse / cleanup / timeout policy for a whole run.
#[derive(Clone, Debug, Default)]
pub struct RunPolicy {
    /// Skip invocation when the expected result file already exists and is
    /// newer than the deck.
    pub iterate: bool,
    /// Delete deck, message, and scratch files after successful parsing.
    pub cleanup: bool,
    /// Optional wall-clock limit per simulator run.
    pub timeout: Option<Duration>,
}

/// What actually happened for one deck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The simulator ran and produced the result file.
    Ran,
    /// `iterate` found a fresh result and skipped the invocation.
    Reused,
}

pub struct Driver<'a> {
    dialect: &'a dyn Dialect,
    /// User command template with `{in}` / `{out}` / `{msg}` placeholders;
    /// falls back to the dialect's default invocation.
    command: Option<String>,
    policy: RunPolicy,
    cancel: Arc<AtomicBool>,
}

impl<'a> Driver<'a> {
    pub fn new(
        dialect: &'a dyn Dialect,
        command: Option<String>,
        policy: RunPolicy,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            dialect,
            command,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Run `deck` and wait for `result` to appear. A non-zero exit code is
    /// not itself fatal; the run fails only when the result file is missing
    /// or empty afterwards, in which case the message log is preserved.
    pub fn run(&self, deck: &Path, result: &Path, msg: &Path) -> Result<RunOutcome, SimError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SimError::Cancelled);
        }
        if self.policy.iterate && is_fresh(result, deck) {
            tracing::info!(result = %result.display(), "iterate: reusing existing result");
            return Ok(RunOutcome::Reused);
        }

        let command_line = self.command_line(deck, result, msg);
        tracing::debug!(%command_line, "spawning simulator");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SimError::SimulationFailed {
                deck: deck.to_path_buf(),
                detail: format!("cannot spawn '{command_line}': {e}"),
            })?;

        let output = self.wait(child)?;
        append_log(msg, &output.stdout);
        append_log(msg, &output.stderr);

        if !output.status.success() {
            tracing::warn!(
                status = %output.status,
                deck = %deck.display(),
                "simulator exited non-zero; checking for results anyway"
            );
        }

        self.collect_result(deck, result)?;
        self.check_markers(deck, result, msg)?;
        Ok(RunOutcome::Ran)
    }

    fn command_line(&self, deck: &Path, result: &Path, msg: &Path) -> String {
        let deck_s = deck.display().to_string();
        let result_s = result.display().to_string();
        let msg_s = msg.display().to_string();
        match &self.command {
            Some(template) => template
                .replace("{in}", &deck_s)
                .replace("{out}", &result_s)
                .replace("{msg}", &msg_s),
            None => self.dialect.default_command(&deck_s, &result_s, &msg_s),
        }
    }

    fn wait(&self, mut child: std::process::Child) -> Result<std::process::Output, SimError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let stdout = drain(child.stdout.take());
                    let stderr = drain(child.stderr.take());
                    return Ok(std::process::Output {
                        status,
                        stdout,
                        stderr,
                    });
                }
                Ok(None) => {
                    if self.cancel.load(Ordering::Relaxed) {
                        tracing::warn!("cancellation requested, terminating simulator");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(SimError::Cancelled);
                    }
                    if let Some(limit) = self.policy.timeout {
                        if started.elapsed() > limit {
                            tracing::warn!(?limit, "simulator timed out, terminating");
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(SimError::Cancelled);
                        }
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(SimError::SimulationFailed {
                        deck: PathBuf::new(),
                        detail: format!("wait failed: {e}"),
                    })
                }
            }
        }
    }

    /// HSPICE appends `.lis` to the `-o` argument; adopt such siblings when
    /// the expected result name is absent.
    fn collect_result(&self, deck: &Path, result: &Path) -> Result<(), SimError> {
        if !result.exists() {
            let lis = result.with_extension("lis");
            if lis.exists() {
                std::fs::rename(&lis, result).map_err(|e| SimError::io(&lis, e))?;
                tracing::debug!(from = %lis.display(), to = %result.display(), "renamed listing");
            }
        }
        let usable = std::fs::metadata(result).map(|m| m.len() > 0).unwrap_or(false);
        if !usable {
            return Err(SimError::SimulationFailed {
                deck: deck.to_path_buf(),
                detail: format!("no result file {} after run", result.display()),
            });
        }
        Ok(())
    }

    /// Scan result and message files for the dialect's abort and
    /// non-convergence markers.
    fn check_markers(&self, deck: &Path, result: &Path, msg: &Path) -> Result<(), SimError> {
        for (path, markers) in [
            (result, [self.dialect.abort_marker(), self.dialect.convergence_marker()]),
            (msg, [self.dialect.abort_marker(), self.dialect.convergence_marker()]),
        ] {
            let Ok(text) = std::fs::read_to_string(path) else {
                continue;
            };
            let lower = text.to_ascii_lowercase();
            for marker in markers {
                if lower.contains(marker) {
                    return Err(SimError::SimulationFailed {
                        deck: deck.to_path_buf(),
                        detail: format!("'{marker}' found in {}", path.display()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove intermediate artifacts after successful parsing. The result
    /// file itself survives so `iterate` can reuse it; message logs survive
    /// only failed items (failures never reach this call).
    pub fn cleanup(&self, deck: &Path, msg: &Path) {
        if !self.policy.cleanup {
            return;
        }
        for path in [deck, msg] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(file = %path.display(), "removed intermediate file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "cleanup failed"),
            }
        }
    }
}

fn is_fresh(result: &Path, deck: &Path) -> bool {
    let Ok(result_meta) = std::fs::metadata(result) else {
        return false;
    };
    if result_meta.len() == 0 {
        return false;
    }
    match (result_meta.modified(), std::fs::metadata(deck).and_then(|m| m.modified())) {
        (Ok(r), Ok(d)) => r >= d,
        // No deck yet means nothing to be stale against.
        (Ok(_), Err(_)) => true,
        _ => false,
    }
}

fn drain(stream: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf);
    }
    buf
}

fn append_log(path: &Path, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    use std::io::Write;
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path);
    match file {
        Ok(mut f) => {
            let _ = f.write_all(bytes);
            if !bytes.ends_with(b"\n") {
                let _ = f.write_all(b"\n");
            }
        }
        Err(e) => tracing::warn!(file = %path.display(), error = %e, "cannot write message log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hspice::Hspice;

    fn driver(policy: RunPolicy, command: &str) -> Driver<'static> {
        Driver::new(
            &Hspice,
            Some(command.to_string()),
            policy,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_run_produces_and_reuses_result() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("put_pad_typ.sp");
        let result = dir.path().join("put_pad_typ.out");
        let msg = dir.path().join("put_pad_typ.msg");
        std::fs::write(&deck, "* deck\n").unwrap();

        // Fake simulator: copies the deck to the result file.
        let d = driver(
            RunPolicy {
                iterate: true,
                ..Default::default()
            },
            "cp {in} {out}",
        );
        assert_eq!(d.run(&deck, &result, &msg).unwrap(), RunOutcome::Ran);
        // Second run with iterate reuses without spawning.
        assert_eq!(d.run(&deck, &result, &msg).unwrap(), RunOutcome::Reused);
    }

    #[test]
    fn test_missing_result_is_simulation_failed() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.sp");
        let result = dir.path().join("deck.out");
        let msg = dir.path().join("deck.msg");
        std::fs::write(&deck, "* deck\n").unwrap();

        let d = driver(RunPolicy::default(), "true");
        let err = d.run(&deck, &result, &msg).unwrap_err();
        assert!(matches!(err, SimError::SimulationFailed { .. }));
    }

    #[test]
    fn test_nonzero_exit_with_result_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.sp");
        let result = dir.path().join("deck.out");
        let msg = dir.path().join("deck.msg");
        std::fs::write(&deck, "* deck\n").unwrap();

        let d = driver(RunPolicy::default(), "cp {in} {out}; exit 3");
        assert_eq!(d.run(&deck, &result, &msg).unwrap(), RunOutcome::Ran);
    }

    #[test]
    fn test_cancelled_before_spawn() {
        let cancel = Arc::new(AtomicBool::new(true));
        let d = Driver::new(&Hspice, Some("true".into()), RunPolicy::default(), cancel);
        let err = d
            .run(Path::new("a.sp"), Path::new("a.out"), Path::new("a.msg"))
            .unwrap_err();
        assert!(matches!(err, SimError::Cancelled));
    }

    #[test]
    fn test_abort_marker_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.sp");
        let result = dir.path().join("deck.out");
        let msg = dir.path().join("deck.msg");
        std::fs::write(&deck, "* deck\n").unwrap();
        let d = driver(RunPolicy::default(), "echo 'run aborted by internal error' >{out}");
        let err = d.run(&deck, &result, &msg).unwrap_err();
        assert!(matches!(err, SimError::SimulationFailed { .. }));
    }
}
