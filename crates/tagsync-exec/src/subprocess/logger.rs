use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

/// Configuration for subprocess output logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Max line length before truncation.
    pub max_line_length: usize,
    /// Log stdout at INFO level (false = DEBUG).
    pub stdout_info: bool,
    /// Log stderr at WARN level (false = DEBUG).
    pub stderr_warn: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: true,
            stderr_warn: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

/// Forward every line of `reader` to tracing until EOF.
pub(crate) async fn forward_lines<R>(reader: R, stream: Stream, job: String, cfg: LogConfig)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(%job, error = %e, "failed to read launcher output");
                break;
            }
        };
        let line = truncate(&line, cfg.max_line_length);

        match stream {
            Stream::Stdout if cfg.stdout_info => info!(%job, "{line}"),
            Stream::Stderr if cfg.stderr_warn => warn!(%job, "{line}"),
            _ => debug!(%job, stream = ?stream, "{line}"),
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
