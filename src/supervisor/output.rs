//! Output routing from supervised processes to an external log sink.
//!
//! One reader task per captured stream feeds a bounded channel; a single
//! drain task forwards to the sink. The read loop never waits on the sink:
//! if the channel is full the line is dropped and counted, not queued.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

const ROUTER_QUEUE: usize = 4_096;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// External log sink collaborator. Implementations must not assume they are
/// called from any particular task.
pub trait LogSink: Send + Sync {
    fn append(&self, project: &str, instance: &str, line: &str, kind: StreamKind);
}

/// Default sink: forwards process output into the engine's own tracing
/// stream. Useful for the bare daemon; GUI layers inject their own sink.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, project: &str, instance: &str, line: &str, kind: StreamKind) {
        match kind {
            StreamKind::Stdout => tracing::info!(target: "auxd::output", %project, %instance, "{}", line),
            StreamKind::Stderr => tracing::warn!(target: "auxd::output", %project, %instance, "{}", line),
        }
    }
}

struct LogEvent {
    project: String,
    instance: String,
    kind: StreamKind,
    line: String,
}

/// Fire-and-forget fan-in from captured stdio streams to the sink.
pub struct OutputRouter {
    tx: mpsc::Sender<LogEvent>,
}

impl OutputRouter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogEvent>(ROUTER_QUEUE);
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                sink.append(&ev.project, &ev.instance, &ev.line, ev.kind);
            }
        });
        Self { tx }
    }

    /// Spawn a reader task that forwards every line of `stream` to the sink,
    /// tagged with the instance name and stream kind. Returns immediately.
    pub fn attach<R>(&self, project: &str, instance: &str, kind: StreamKind, stream: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tx = self.tx.clone();
        let project = project.to_string();
        let instance = instance.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stream);
            let mut lines = reader.lines();
            let mut dropped: u64 = 0;
            while let Ok(Some(line)) = lines.next_line().await {
                let ev = LogEvent {
                    project: project.clone(),
                    instance: instance.clone(),
                    kind,
                    line,
                };
                if tx.try_send(ev).is_err() {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                tracing::debug!(
                    "Dropped {} {} lines from '{}' (sink backpressure)",
                    dropped,
                    kind.as_str(),
                    instance
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;

    struct CollectSink {
        lines: Mutex<Vec<(String, String, String, StreamKind)>>,
    }

    impl LogSink for CollectSink {
        fn append(&self, project: &str, instance: &str, line: &str, kind: StreamKind) {
            self.lines.lock().unwrap().push((
                project.to_string(),
                instance.to_string(),
                line.to_string(),
                kind,
            ));
        }
    }

    #[tokio::test]
    async fn test_router_forwards_tagged_lines() {
        let sink = Arc::new(CollectSink {
            lines: Mutex::new(Vec::new()),
        });
        let router = OutputRouter::new(sink.clone());

        let (mut writer, reader) = tokio::io::duplex(256);
        router.attach("proj-1", "worker_1", StreamKind::Stdout, reader);

        writer.write_all(b"job processed\nqueue empty\n").await.unwrap();
        drop(writer);

        // reader + drain tasks need a moment
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if sink.lines.lock().unwrap().len() == 2 {
                break;
            }
        }

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "proj-1");
        assert_eq!(lines[0].1, "worker_1");
        assert_eq!(lines[0].2, "job processed");
        assert_eq!(lines[0].3, StreamKind::Stdout);
        assert_eq!(lines[1].2, "queue empty");
    }

    #[test]
    fn test_stream_kind_labels() {
        assert_eq!(StreamKind::Stdout.as_str(), "stdout");
        assert_eq!(StreamKind::Stderr.as_str(), "stderr");
    }
}
