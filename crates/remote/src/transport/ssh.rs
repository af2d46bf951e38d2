//! Transport backed by the system `ssh`, `rsync` and `timeout` binaries.

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{ExecOutput, ExecRequest, Payload, SessionOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Every session runs under `timeout(1)`.
const TIMEOUT_BIN: &str = "timeout";

/// Transport that shells out to `ssh` and `rsync`.
///
/// Loopback addresses are served by a local `bash` instead of ssh.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshTransport;

impl SshTransport {
    /// Create a new transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for SshTransport {
    fn exec(&self, ip: &str, request: &ExecRequest) -> Result<ExecOutput> {
        let input = match &request.payload {
            Payload::Command(_) => None,
            Payload::Script(path) => Some(std::fs::read(path).map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Error::LocalNotFound(path.clone())
                } else {
                    Error::Io(e)
                }
            })?),
        };

        let args = exec_args(ip, request);
        log::trace!("{ip}: {TIMEOUT_BIN} {}", args.join(" "));
        run(&args, input)
    }

    fn get(
        &self,
        ip: &str,
        remote_paths: &[String],
        local_dir: &Path,
        options: &SessionOptions,
    ) -> Result<()> {
        if remote_paths.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(local_dir)?;

        let args = get_args(ip, local_dir, options);
        let mut list = remote_paths.join("\n");
        list.push('\n');

        let output = run(&args, Some(list.into_bytes()))?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::from_output(ip, "rsync get", &output, options.timeout))
        }
    }

    fn put(&self, ip: &str, src: &Path, dst: &str, options: &SessionOptions) -> Result<()> {
        if !src.exists() {
            return Err(Error::LocalNotFound(src.to_path_buf()));
        }

        let args = put_args(ip, src, dst, options);
        let output = run(&args, None)?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::from_output(ip, "rsync put", &output, options.timeout))
        }
    }
}

/// Whether `ip` names this machine.
pub fn is_local(ip: &str) -> bool {
    ip == "localhost" || ip.starts_with("127.")
}

/// Arguments to `timeout` for a single execution.
pub fn exec_args(ip: &str, request: &ExecRequest) -> Vec<String> {
    let options = &request.options;
    let mut args = vec![options.timeout.to_string()];

    if is_local(ip) {
        args.extend(["bash".to_string(), "-c".to_string()]);
    } else {
        args.extend(["ssh".to_string(), "-T".to_string()]);
        args.extend(options.ssh_opts.iter().cloned());
        args.push(ip.to_string());
    }
    args.push(request.remote_command());
    args
}

/// Arguments to `timeout` for pulling the paths listed on stdin.
pub fn get_args(ip: &str, local_dir: &Path, options: &SessionOptions) -> Vec<String> {
    let mut args = vec![
        options.timeout.to_string(),
        "rsync".to_string(),
        "-avzr".to_string(),
    ];
    let source = if is_local(ip) {
        "/".to_string()
    } else {
        args.extend(["-e".to_string(), options.rsync_shell()]);
        format!("{ip}:/")
    };
    args.extend([
        "--files-from=-".to_string(),
        source,
        local_dir.display().to_string(),
    ]);
    args
}

/// Arguments to `timeout` for pushing `src` to `dst` on the node.
pub fn put_args(ip: &str, src: &Path, dst: &str, options: &SessionOptions) -> Vec<String> {
    let mut args = vec![
        options.timeout.to_string(),
        "rsync".to_string(),
        "-avzr".to_string(),
    ];
    let target = if is_local(ip) {
        dst.to_string()
    } else {
        args.extend(["-e".to_string(), options.rsync_shell()]);
        format!("{ip}:{dst}")
    };
    args.extend([src.display().to_string(), target]);
    args
}

fn run(args: &[String], input: Option<Vec<u8>>) -> Result<ExecOutput> {
    let stdin = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut child = Command::new(TIMEOUT_BIN)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn {
            program: TIMEOUT_BIN.to_string(),
            source,
        })?;

    // The child may fill its stdout pipe before it drains stdin
    let writer = match (input, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&bytes))),
        _ => None,
    };

    let output = child.wait_with_output()?;

    if let Some(writer) = writer {
        match writer.join() {
            Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                log::debug!("failed to write session input: {e}");
            }
            Err(_) => log::debug!("session input writer panicked"),
            _ => {}
        }
    }

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code().unwrap_or(-1),
    })
}
