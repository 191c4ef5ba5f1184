//! `cwebp` as an external process.
//!
//! ```text
//! cwebp -q <quality> [-resize <width> 0] <input> -o <output>
//! ```
//!
//! A height of `0` asks cwebp to keep the aspect ratio. Each invocation is
//! bounded by a timeout; a process that outlives it is killed and the
//! encode reported as [`CodecError::Timeout`].

use super::backend::{Codec, CodecError};
use super::params::EncodeParams;
use crate::config::CodecConfig;
use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_PROGRAM: &str = "cwebp";

/// Encoder backed by the `cwebp` command-line tool.
#[derive(Debug, Clone)]
pub struct CwebpCodec {
    program: PathBuf,
    timeout: Duration,
}

impl CwebpCodec {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(&config.program, config.timeout())
    }

    /// Command-line arguments for one encode.
    pub fn build_args(params: &EncodeParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-q".into(), params.quality.value().to_string().into()];
        if let Some(width) = params.width {
            args.push("-resize".into());
            args.push(width.to_string().into());
            args.push("0".into());
        }
        args.push(params.source.clone().into_os_string());
        args.push("-o".into());
        args.push(params.output.clone().into_os_string());
        args
    }

    fn program_label(&self) -> String {
        self.program.display().to_string()
    }
}

impl Codec for CwebpCodec {
    fn name(&self) -> &str {
        "cwebp"
    }

    fn probe(&self) -> Result<(), CodecError> {
        let resolved = which::which(&self.program).map_err(|_| CodecError::NotFound {
            program: self.program_label(),
        })?;
        debug!(program = %resolved.display(), "probing codec");
        let mut cmd = Command::new(&resolved);
        cmd.arg("-version");
        run_with_timeout(&mut cmd, self.timeout).map_err(|e| CodecError::Unusable {
            program: self.program_label(),
            reason: e.to_string(),
        })
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), CodecError> {
        let args = Self::build_args(params);
        debug!(
            "Running {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        run_with_timeout(&mut cmd, self.timeout)
    }
}

/// Run a command to completion, killing it once `timeout` has elapsed.
///
/// Stderr is drained on a helper thread so a chatty process cannot block
/// on a full pipe while we wait for its exit. It is collected on both the
/// exit and the timeout path.
fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<(), CodecError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let stderr = child.stderr.take();
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let Some(status) = child.wait_timeout(timeout)? else {
        let _ = child.kill();
        let _ = child.wait();
        let stderr = reader.join().unwrap_or_default();
        warn!(
            stderr = %stderr.trim(),
            "codec timed out after {:?}, process killed",
            timeout
        );
        return Err(CodecError::Timeout(timeout));
    };

    let stderr = reader.join().unwrap_or_default();
    if status.success() {
        Ok(())
    } else {
        Err(CodecError::Failed {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}
