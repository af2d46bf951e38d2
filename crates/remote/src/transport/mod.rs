//! Transport abstraction for node sessions.
//!
//! The [`Transport`] trait covers the three things done to a node: run
//! something, pull files from it and push files to it. [`ssh::SshTransport`]
//! is the real implementation; [`MockTransport`] serves tests.
//!
//! # Testing
//!
//! ```
//! use remote::transport::{MockTransport, Transport};
//! use remote::{ExecOutput, ExecRequest, SessionOptions};
//!
//! let mock = MockTransport::new();
//! mock.add_response("hostname", ExecOutput { stdout: "node-1\n".into(), ..Default::default() });
//!
//! let out = mock
//!     .exec("10.20.0.3", &ExecRequest::command("hostname", SessionOptions::default()))
//!     .unwrap();
//! assert_eq!(out.stdout, "node-1\n");
//! ```

pub mod ssh;

use crate::error::{Error, Result};
use crate::types::{ExecOutput, ExecRequest, Payload, SessionOptions};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Operations on a single node.
///
/// Implementations must be shareable across worker threads; every call is
/// independent of every other.
pub trait Transport: Send + Sync {
    /// Run a command or script on `ip`.
    ///
    /// A nonzero exit is not an error: it is returned in
    /// [`ExecOutput::code`] for the caller to judge. Errors mean the session
    /// could not be set up at all.
    fn exec(&self, ip: &str, request: &ExecRequest) -> Result<ExecOutput>;

    /// Copy `remote_paths` from `ip` into `local_dir`, keeping their
    /// directory structure.
    fn get(
        &self,
        ip: &str,
        remote_paths: &[String],
        local_dir: &Path,
        options: &SessionOptions,
    ) -> Result<()>;

    /// Copy local `src` to `dst` on `ip`.
    fn put(&self, ip: &str, src: &Path, dst: &str, options: &SessionOptions) -> Result<()>;
}

/// Get the default transport (system ssh and rsync).
pub fn default_transport() -> ssh::SshTransport {
    ssh::SshTransport::new()
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `exec` with the command text or script file name
    Exec {
        /// Node address
        ip: String,
        /// Command text or script file name
        what: String,
        /// Environment the session exported
        env: Vec<String>,
    },
    /// `get` with the requested paths
    Get {
        /// Node address
        ip: String,
        /// Remote paths
        paths: Vec<String>,
    },
    /// `put` with source and destination
    Put {
        /// Node address
        ip: String,
        /// Local source
        src: String,
        /// Remote destination
        dst: String,
    },
}

/// In-memory transport for tests.
///
/// Responses are keyed by command text, or by file name for scripts.
/// Unknown commands succeed and echo their key. The mock also tracks how
/// many calls were in flight at once.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, ExecOutput>>>,
    unreachable: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a new empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer `key` with `output`.
    pub fn add_response(&self, key: impl Into<String>, output: ExecOutput) {
        lock(&self.responses).insert(key.into(), output);
    }

    /// Make every call to `ip` fail with a connection error.
    pub fn set_unreachable(&self, ip: impl Into<String>) {
        lock(&self.unreachable).insert(ip.into());
    }

    /// Calls made so far, in completion order.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, ip: &str) -> Result<InFlight<'_>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.active);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if lock(&self.unreachable).contains(ip) {
            return Err(Error::Connection {
                ip: ip.to_string(),
                message: "ssh: connect to host: No route to host".to_string(),
            });
        }
        Ok(guard)
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

impl Transport for MockTransport {
    fn exec(&self, ip: &str, request: &ExecRequest) -> Result<ExecOutput> {
        let _guard = self.enter(ip)?;

        let key = match &request.payload {
            Payload::Command(cmd) => cmd.clone(),
            Payload::Script(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let output = lock(&self.responses)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ExecOutput {
                stdout: format!("{key}\n"),
                ..Default::default()
            });

        self.record(MockCall::Exec {
            ip: ip.to_string(),
            what: key,
            env: request.options.env_vars.clone(),
        });
        Ok(output)
    }

    fn get(
        &self,
        ip: &str,
        remote_paths: &[String],
        local_dir: &Path,
        _options: &SessionOptions,
    ) -> Result<()> {
        let _guard = self.enter(ip)?;

        for path in remote_paths {
            let dest = local_dir.join(path.trim_start_matches('/'));
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, format!("{ip}:{path}\n"))?;
        }

        self.record(MockCall::Get {
            ip: ip.to_string(),
            paths: remote_paths.to_vec(),
        });
        Ok(())
    }

    fn put(&self, ip: &str, src: &Path, dst: &str, _options: &SessionOptions) -> Result<()> {
        let _guard = self.enter(ip)?;

        self.record(MockCall::Put {
            ip: ip.to_string(),
            src: src.display().to_string(),
            dst: dst.to_string(),
        });
        Ok(())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_mock_echoes_unknown_commands() {
        let mock = MockTransport::new();
        let out = mock
            .exec("10.0.0.1", &ExecRequest::command("uptime", SessionOptions::default()))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "uptime\n");
    }

    #[test]
    fn test_mock_script_keyed_by_file_name() {
        let mock = MockTransport::new();
        mock.add_response(
            "check.sh",
            ExecOutput {
                stdout: String::new(),
                stderr: "boom".into(),
                code: 2,
            },
        );

        let out = mock
            .exec(
                "10.0.0.1",
                &ExecRequest::script("/rq/scripts/check.sh", SessionOptions::default()),
            )
            .unwrap();
        assert_eq!(out.code, 2);
        assert_eq!(
            mock.calls(),
            vec![MockCall::Exec {
                ip: "10.0.0.1".into(),
                what: "check.sh".into(),
                env: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_mock_unreachable() {
        let mock = MockTransport::new();
        mock.set_unreachable("10.0.0.9");
        let err = mock
            .exec("10.0.0.9", &ExecRequest::command("true", SessionOptions::default()))
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Connection);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_mock_get_writes_files() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        mock.get(
            "10.0.0.1",
            &["/etc/hosts".to_string()],
            dir.path(),
            &SessionOptions::default(),
        )
        .unwrap();
        let content = std::fs::read_to_string(dir.path().join("etc/hosts")).unwrap();
        assert_eq!(content, "10.0.0.1:/etc/hosts\n");
    }

    #[test]
    fn test_mock_tracks_peak_concurrency() {
        let mock = MockTransport::new().with_delay(Duration::from_millis(50));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let mock = mock.clone();
                thread::spawn(move || {
                    let request = ExecRequest::command("true", SessionOptions::default());
                    mock.exec(&format!("10.0.0.{i}"), &request).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(mock.peak_concurrency() >= 2);
        assert_eq!(mock.calls().len(), 3);
    }
}
