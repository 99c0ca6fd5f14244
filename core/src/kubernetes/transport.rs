//! Tunnel transport backed by `kubectl port-forward` child processes.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::discovery::find_kubectl;
use super::errors::KubectlError;
use crate::config::Config;
use crate::domain::{PortTunnel, ResourcePath};
use crate::error::{Error, Result};
use crate::ports::{Transport, TransportHandle, TunnelCloser};

/// Maximum stderr lines kept for error reporting.
const STDERR_TAIL: usize = 20;

/// Opens tunnels by spawning `kubectl port-forward`.
#[derive(Debug, Clone)]
pub struct KubectlTransport {
    kubectl_path: Option<PathBuf>,
    context: Option<String>,
}

impl KubectlTransport {
    pub fn new() -> Self {
        Self {
            kubectl_path: find_kubectl(),
            context: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            kubectl_path: config.kubectl_path.clone().or_else(find_kubectl),
            context: config.context.clone(),
        }
    }
}

impl Default for KubectlTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for KubectlTransport {
    type Handle = KubectlForward;

    fn open(
        &self,
        pod: &ResourcePath,
        container: &str,
        tunnels: &[PortTunnel],
    ) -> Result<Self::Handle> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;
        let first = tunnels
            .first()
            .ok_or_else(|| Error::InvalidPortSpec("no port mapping".to_string()))?;

        let args = port_forward_args(self.context.as_deref(), pod, &first.address, tunnels);
        debug!(pod = %pod, container = container, ?args, "Starting kubectl port-forward");

        let mut child = Command::new(kubectl_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KubectlError::ProcessError(format!("Failed to start kubectl: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KubectlError::ProcessError("kubectl stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| KubectlError::ProcessError("kubectl stderr unavailable".to_string()))?;

        let closer = Arc::new(ProcessCloser {
            pid: child.id(),
            exited: AtomicBool::new(false),
        });

        Ok(KubectlForward {
            child,
            stdout: BufReader::new(stdout).lines(),
            stderr_tail: Arc::new(Mutex::new(Vec::new())),
            stderr_task: None,
            stderr: Some(stderr),
            expected: tunnels.to_vec(),
            closer,
        })
    }
}

/// Builds the kubectl arguments for one port-forward session.
///
/// kubectl binds every mapping on the same address list, so the first
/// tunnel's address is used for the whole session.
fn port_forward_args(
    context: Option<&str>,
    pod: &ResourcePath,
    address: &str,
    tunnels: &[PortTunnel],
) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(context) = context {
        args.extend(["--context".to_string(), context.to_string()]);
    }
    args.extend([
        "port-forward".to_string(),
        "-n".to_string(),
        pod.namespace.clone(),
        format!("pod/{}", pod.name),
    ]);
    args.extend(
        tunnels
            .iter()
            .map(|t| format!("{}:{}", t.local_port, t.container_port)),
    );
    args.push(format!("--address={}", address));
    args
}

/// Sends SIGTERM to the kubectl child unless it already exited.
struct ProcessCloser {
    pid: Option<u32>,
    exited: AtomicBool,
}

impl TunnelCloser for ProcessCloser {
    fn close(&self) {
        if self.exited.load(Ordering::SeqCst) {
            return;
        }
        let Some(pid) = self.pid else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(pid = pid, error = %e, "Failed to signal kubectl port-forward");
            }
        }

        #[cfg(not(unix))]
        {
            let _ = std::process::Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status();
        }
    }
}

/// A running `kubectl port-forward` child process.
pub struct KubectlForward {
    child: Child,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Option<ChildStderr>,
    stderr_tail: Arc<Mutex<Vec<String>>>,
    stderr_task: Option<JoinHandle<()>>,
    expected: Vec<PortTunnel>,
    closer: Arc<ProcessCloser>,
}

impl KubectlForward {
    /// Starts collecting stderr lines in the background.
    fn spawn_stderr_reader(&mut self) {
        let Some(stderr) = self.stderr.take() else {
            return;
        };
        let tail = Arc::clone(&self.stderr_tail);

        self.stderr_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(line = %line, "kubectl stderr");
                let mut tail = tail.lock();
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }));
    }

    /// Waits for the stderr reader to finish and returns the failure it saw.
    async fn stderr_failure(&mut self) -> Error {
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
        let tail = self.stderr_tail.lock().clone();
        failure_from_stderr(&tail, &self.expected)
    }

    async fn reap(&mut self) -> Result<std::process::ExitStatus> {
        let status = self.child.wait().await;
        self.closer.exited.store(true, Ordering::SeqCst);
        Ok(status?)
    }
}

impl TransportHandle for KubectlForward {
    async fn ready(&mut self) -> Result<()> {
        self.spawn_stderr_reader();

        let forwarding = Regex::new(r"^Forwarding from (\S+):(\d+) -> (\d+)")
            .map_err(|e| Error::Transport(e.to_string()))?;
        let mut pending: Vec<u16> = self.expected.iter().map(|t| t.local_port).collect();

        while !pending.is_empty() {
            match self.stdout.next_line().await? {
                Some(line) => {
                    debug!(line = %line, "kubectl stdout");
                    let Some(caps) = forwarding.captures(&line) else {
                        continue;
                    };
                    if let Ok(port) = caps[2].parse::<u16>() {
                        pending.retain(|p| *p != port);
                    }
                }
                None => {
                    // stdout closed before every port came up
                    let _ = self.reap().await;
                    return Err(self.stderr_failure().await);
                }
            }
        }

        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        while let Some(line) = self.stdout.next_line().await? {
            debug!(line = %line, "kubectl stdout");
        }

        let status = self.reap().await?;
        if status.success() {
            return Ok(());
        }

        Err(self.stderr_failure().await)
    }

    fn closer(&self) -> Arc<dyn TunnelCloser> {
        self.closer.clone()
    }
}

/// Maps collected stderr lines to the most specific error available.
fn failure_from_stderr(lines: &[String], tunnels: &[PortTunnel]) -> Error {
    for line in lines {
        if let Some(port) = detect_port_conflict(line) {
            let address = tunnels
                .iter()
                .find(|t| t.local_port == port)
                .map(|t| t.address.clone())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            return Error::PortUnavailable {
                address,
                port,
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, line.clone()),
            };
        }
    }

    let message = lines
        .iter()
        .rev()
        .find(|l| is_error_line(l))
        .or_else(|| lines.last())
        .cloned()
        .unwrap_or_else(|| "kubectl port-forward exited".to_string());

    Error::Transport(message)
}

// ============================================================================
// Output Parsing
// ============================================================================

/// Checks if a line indicates an error.
pub fn is_error_line(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("error")
        || line_lower.contains("failed")
        || line_lower.contains("unable to")
        || line_lower.contains("connection refused")
        || line_lower.contains("lost connection")
        || line_lower.contains("an error occurred")
}

/// Detects port conflict from output line.
/// Returns the conflicting port if detected.
pub fn detect_port_conflict(line: &str) -> Option<u16> {
    // kubectl format: "Unable to listen on port 8080: ... listen tcp4 127.0.0.1:8080: bind: address already in use"

    if !line.to_lowercase().contains("address already in use") {
        return None;
    }

    // Look for patterns like ":8080" followed by non-digit
    for (i, part) in line.split(':').enumerate() {
        // Skip first part (before any colon)
        if i == 0 {
            continue;
        }

        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }

        if let Ok(port) = digits.parse::<u16>() {
            // Skip IP octets which are typically small numbers
            if port > 255 {
                return Some(port);
            }
        }
    }

    None
}
