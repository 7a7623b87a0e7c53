//! # devbuild Process Execution Utilities (`common::process`)
//!
//! File: cli/src/common/process.rs
//!
//! ## Overview
//!
//! Spawns an external tool with both standard output and standard error
//! captured and merged into one stream of text lines, delivered while the tool
//! is still running.
//!
//! ## Architecture
//!
//! - `spawn_with_merged_output`: starts the child (stdin closed, stdout and
//!   stderr piped, killed if the handle is dropped) and starts one reader task
//!   per pipe. Both tasks feed the same bounded channel, so lines from the two
//!   pipes are interleaved in the order they are read, and each pipe's own
//!   order is preserved.
//! - `decode_line`: turns raw bytes into a line without its terminator.
//!   Invalid UTF-8 is replaced rather than rejected, since build tools often
//!   print in the console code page.
//!
//! The channel closes once both pipes reach end-of-file, which happens when
//! the child (and any grandchildren holding the pipes) exit.
//!
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines buffered between the pipe readers and the consumer.
const LINE_BUFFER: usize = 1024;

/// A running child process and the merged lines of its stdout and stderr.
#[derive(Debug)]
pub struct MergedChild {
    pub child: Child,
    pub lines: mpsc::Receiver<String>,
}

/// Spawns `program args...` in `working_directory` with stdout and stderr
/// merged into one line channel.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_with_merged_output(
    program: &Path,
    args: &[OsString],
    working_directory: &Path,
) -> std::io::Result<MergedChild> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    debug!(pid = ?child.id(), program = %program.display(), "Spawned child process");

    let (tx, lines) = mpsc::channel(LINE_BUFFER);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone(), "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx, "stderr"));
    }
    Ok(MergedChild { child, lines })
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_line(&buf)).await.is_err() {
                    // Receiver gone: the job stopped listening.
                    break;
                }
            }
            Err(e) => {
                warn!(stream, error = %e, "Failed to read child output");
                break;
            }
        }
    }
    debug!(stream, "Child output stream closed");
}

/// Decodes one raw line, dropping a trailing `\n` or `\r\n`.
pub fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
