//! Child-process invocation with drained pipes and deadline enforcement.
//!
//! All external tools (ffprobe, ffmpeg, the speech decoder, the downloader)
//! run through this module. Stdout and stderr are drained on separate
//! threads so a chatty tool can never deadlock on a full pipe buffer, and a
//! deadline kills the child rather than the process.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{SyncSender, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval while waiting for a child to exit.
const WAIT_POLL_MS: u64 = 50;

/// Read buffer size for pipe draining.
const DRAIN_BUF_BYTES: usize = 64 * 1024;

/// Channel capacity for streamed stdout chunks (backpressure).
const STREAM_CHANNEL_CAPACITY: usize = 8;

/// Captured result of a completed tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status code, -1 when terminated by signal.
    pub status: i32,
    /// Captured stdout (empty in streaming mode).
    pub stdout: Vec<u8>,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Convert a non-zero exit into a [`Error::ToolFailed`].
    pub fn ensure_success(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ToolFailed {
                program: program.to_string(),
                status: self.status,
                stderr_tail: stderr_tail(&self.stderr),
            })
        }
    }

    /// Stdout decoded as UTF-8, lossily.
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Last portion of a stderr capture, for error messages.
pub fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    let mut start = trimmed.len().saturating_sub(500);
    while start < trimmed.len() && !trimmed.is_char_boundary(start) {
        start += 1;
    }
    let tail: Vec<&str> = trimmed[start..].lines().rev().take(6).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: String,
    args: Vec<String>,
}

impl ToolInvocation {
    /// Create an invocation for `program` with the given arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The program name, for error reporting.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// When `deadline` elapses before the child exits, the child is killed
    /// and waited, and [`Error::ToolTimeout`] is returned.
    pub fn run(&self, deadline: Option<Duration>) -> Result<ToolOutput> {
        self.run_inner(deadline, None)
    }

    /// Run with stdout streamed to `on_chunk` instead of captured.
    ///
    /// Chunks arrive in read order; the callback may return an error to
    /// abort the invocation (the child is killed).
    pub fn run_streaming(
        &self,
        deadline: Option<Duration>,
        on_chunk: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<ToolOutput> {
        self.run_inner(deadline, Some(on_chunk))
    }

    fn run_inner(
        &self,
        deadline: Option<Duration>,
        mut on_chunk: Option<&mut dyn FnMut(&[u8]) -> Result<()>>,
    ) -> Result<ToolOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::ToolSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::Internal {
            message: "child stdout pipe missing".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| Error::Internal {
            message: "child stderr pipe missing".to_string(),
        })?;

        let (tx, rx) = sync_channel::<Vec<u8>>(STREAM_CHANNEL_CAPACITY);
        let stdout_handle = spawn_drain(stdout, tx);
        let stderr_handle: JoinHandle<Vec<u8>> = thread::spawn(move || {
            let mut reader = stderr;
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        });

        let started = Instant::now();
        let mut captured_stdout = Vec::new();
        let mut callback_error: Option<Error> = None;

        // Consume stdout chunks until the pipe closes, which marks the
        // child's exit; poll the deadline between chunks. After a callback
        // error the child is killed and remaining chunks are discarded.
        let status = loop {
            match rx.recv_timeout(Duration::from_millis(WAIT_POLL_MS)) {
                Ok(chunk) => {
                    if callback_error.is_none() {
                        if let Some(cb) = on_chunk.as_deref_mut() {
                            if let Err(e) = cb(&chunk) {
                                callback_error = Some(e);
                                kill_and_wait(&mut child);
                            }
                        } else {
                            captured_stdout.extend_from_slice(&chunk);
                        }
                    }
                    continue;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    // Stdout closed and fully drained; reap the child.
                    break child.wait().map(|s| s.code().unwrap_or(-1))?;
                }
            }

            if let Some(limit) = deadline {
                if started.elapsed() >= limit && child.try_wait()?.is_none() {
                    kill_and_wait(&mut child);
                    // The drain thread may be blocked on a full channel;
                    // release our end before joining it.
                    drop(rx);
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(Error::ToolTimeout {
                        program: self.program.clone(),
                        deadline_secs: limit.as_secs(),
                    });
                }
            }
        };

        let _ = stdout_handle.join();
        let stderr_bytes = stderr_handle.join().unwrap_or_default();

        if let Some(e) = callback_error {
            return Err(e);
        }

        Ok(ToolOutput {
            status,
            stdout: captured_stdout,
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        })
    }
}

/// Spawn a thread that drains a pipe into fixed-size chunks on a channel.
fn spawn_drain<R: Read + Send + 'static>(
    mut reader: R,
    tx: SyncSender<Vec<u8>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; DRAIN_BUF_BYTES];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    // Blocks when the channel is full (backpressure);
                    // send fails only when the receiver is gone.
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
        // tx drops here, closing the channel
    })
}

/// Kill a child and reap it, ignoring already-exited races.
fn kill_and_wait(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Accumulates streamed bytes into fixed-size frames.
///
/// The visual analyzer receives raw grayscale planes on stdout; pipe reads
/// do not align with frame boundaries, so this buffers partial frames and
/// yields only complete ones.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_bytes: usize,
    pending: Vec<u8>,
}

impl FrameAssembler {
    /// Create an assembler for frames of `frame_bytes` each.
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            frame_bytes,
            pending: Vec::with_capacity(frame_bytes),
        }
    }

    /// Feed a chunk, invoking `on_frame` for every completed frame.
    pub fn feed(&mut self, chunk: &[u8], on_frame: &mut dyn FnMut(&[u8])) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let needed = self.frame_bytes - self.pending.len();
            let take = needed.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_bytes {
                on_frame(&self.pending);
                self.pending.clear();
            }
        }
    }

    /// Bytes of an incomplete trailing frame, if any.
    pub fn remainder(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_assembler_reassembles_across_chunks() {
        let mut asm = FrameAssembler::new(4);
        let mut frames: Vec<Vec<u8>> = Vec::new();
        let mut collect = |f: &[u8]| frames.push(f.to_vec());
        asm.feed(&[1, 2], &mut collect);
        asm.feed(&[3, 4, 5], &mut collect);
        asm.feed(&[6, 7, 8, 9, 10, 11, 12], &mut collect);
        assert_eq!(frames, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10, 11, 12]]);
        assert_eq!(asm.remainder(), 0);
    }

    #[test]
    fn frame_assembler_reports_partial_trailing_frame() {
        let mut asm = FrameAssembler::new(4);
        let mut count = 0usize;
        let mut collect = |_: &[u8]| count += 1;
        asm.feed(&[1, 2, 3, 4, 5], &mut collect);
        assert_eq!(count, 1);
        assert_eq!(asm.remainder(), 1);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long = (0..20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&long);
        assert!(tail.contains("line 19"));
        assert!(!tail.contains("line 0 |"));
    }

    #[test]
    fn run_captures_stdout() {
        let tool = ToolInvocation::new("echo", ["hello"]);
        let out = tool.run(None).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_str().trim(), "hello");
    }

    #[test]
    fn run_times_out_and_kills() {
        let tool = ToolInvocation::new("sleep", ["5"]);
        let started = Instant::now();
        let err = tool.run(Some(Duration::from_millis(200))).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(matches!(err, Error::ToolTimeout { .. }));
    }

    #[test]
    fn nonzero_exit_maps_to_tool_failed() {
        let tool = ToolInvocation::new("false", Vec::<String>::new());
        let out = tool.run(None).unwrap();
        assert!(!out.success());
        let err = out.ensure_success("false").unwrap_err();
        assert!(matches!(err, Error::ToolFailed { status: 1, .. }));
    }
}
