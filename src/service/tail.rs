//! Polling log file tailer.
//!
//! Launchd collects nothing on the daemon's behalf, so log streaming is
//! self-implemented: emit the last `n` lines of the file, seek to its end
//! and forward newly appended bytes until cancelled. Each tail runs as its
//! own task carrying a cancellation token, and the caller joins the tasks
//! before returning.

use std::collections::VecDeque;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};

const READ_CHUNK: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tail one log file into `out`.
///
/// Emits the last `last_lines` lines, then forwards appended bytes
/// verbatim, polling once per second, until `cancel` fires or the
/// destination goes away.
pub async fn tail_file<W>(
    path: PathBuf,
    last_lines: usize,
    mut out: W,
    cancel: CancellationToken,
) -> ServiceResult<()>
where
    W: AsyncWrite + Unpin,
{
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ServiceError::LogFileNotFound { path });
        }
        Err(e) => return Err(e.into()),
    };

    // Bounded backlog: scan the whole file keeping only the last
    // `last_lines` lines.
    let mut lines = BufReader::new(file).lines();
    let mut backlog: VecDeque<String> = VecDeque::with_capacity(last_lines);
    if last_lines > 0 {
        while let Some(line) = lines.next_line().await? {
            if backlog.len() == last_lines {
                backlog.pop_front();
            }
            backlog.push_back(line);
        }
        for line in &backlog {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
    }

    let mut file = lines.into_inner().into_inner();
    file.seek(SeekFrom::End(0)).await?;

    let mut buf = [0u8; READ_CHUNK];
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let read = file.read(&mut buf).await?;
        if read > 0 {
            out.write_all(&buf[..read]).await?;
            out.flush().await?;
        } else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(POLL_INTERVAL) => {}
            }
        }
    }
    Ok(())
}
