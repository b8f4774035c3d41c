use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_FILTER: &str = "info,biosynth=debug";

/// Fans every formatted log line out to SSE subscribers, optionally echoing it to stdout.
#[derive(Clone)]
pub(crate) struct SseMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct SseWriter {
    sender: broadcast::Sender<String>,
    suppress_stdout: bool,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

/// `RUST_LOG` wins; otherwise info everywhere and debug for this crate.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. A second call is a no-op.
pub(crate) fn init_logging(sender: broadcast::Sender<String>, suppress_stdout: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(SseMakeWriter {
            sender,
            suppress_stdout,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn writer_broadcasts_each_line() {
        let (tx, mut rx) = broadcast::channel(4);
        let make = SseMakeWriter {
            sender: tx,
            suppress_stdout: true,
        };
        let mut writer = make.make_writer();
        writer.write_all(b"run started\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(rx.try_recv().unwrap(), "run started\n");
    }

    #[test]
    fn writing_without_subscribers_is_fine() {
        let (tx, rx) = broadcast::channel::<String>(1);
        drop(rx);
        let mut writer = SseMakeWriter {
            sender: tx,
            suppress_stdout: true,
        }
        .make_writer();
        assert_eq!(writer.write(b"nobody listens").unwrap(), 14);
    }
}
