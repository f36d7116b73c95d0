//! Port traits abstracting process execution away from the build engine.
//!
//! Tests substitute a scripted executor to verify argv, cwd, env, and
//! captured output without spawning anything.

use anyhow::Context;
use camino::Utf8PathBuf;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A fully resolved child-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
    pub cwd: Utf8PathBuf,
    pub env: Vec<(String, String)>,
}

/// Cooperative cancellation flag shared between the caller and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Child-process spawner capability.
pub trait ProcessExecutor {
    /// Run the invocation to completion, forwarding its stdout/stderr into
    /// the sinks. Returns the child's exit code.
    ///
    /// When `cancel` trips mid-run the child must be terminated and an error
    /// returned.
    fn run(
        &self,
        invocation: &Invocation,
        out: &mut dyn io::Write,
        err: &mut dyn io::Write,
        cancel: &CancellationToken,
    ) -> anyhow::Result<i32>;
}

/// `std::process`-backed executor. The child gets exactly the invocation's
/// environment, a null stdin, and piped output that is forwarded to the
/// sinks once the process exits.
#[derive(Debug, Clone)]
pub struct StdProcessExecutor {
    poll_interval: Duration,
}

impl Default for StdProcessExecutor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl StdProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessExecutor for StdProcessExecutor {
    fn run(
        &self,
        invocation: &Invocation,
        out: &mut dyn io::Write,
        err: &mut dyn io::Write,
        cancel: &CancellationToken,
    ) -> anyhow::Result<i32> {
        let mut child = Command::new(invocation.program.as_std_path())
            .args(&invocation.args)
            .current_dir(invocation.cwd.as_std_path())
            .env_clear()
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", invocation.program))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stderr was not captured"))?;

        // Pump threads keep the pipes drained so the child never blocks on a
        // full buffer while we poll for exit or cancellation.
        let out_pump = std::thread::spawn(move || drain(stdout));
        let err_pump = std::thread::spawn(move || drain(stderr));

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                let _ = out_pump.join();
                let _ = err_pump.join();
                anyhow::bail!("terminated by cancellation");
            }
            match child.try_wait().context("wait for child")? {
                Some(status) => break status,
                None => std::thread::sleep(self.poll_interval),
            }
        };

        let captured_out = out_pump.join().unwrap_or_default();
        let captured_err = err_pump.join().unwrap_or_default();
        out.write_all(&captured_out).context("forward stdout")?;
        err.write_all(&captured_err).context("forward stderr")?;

        Ok(status.code().unwrap_or(-1))
    }
}

fn drain(mut reader: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf);
    buf
}
