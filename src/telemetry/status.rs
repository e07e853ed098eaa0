//! Operator status text

use crate::hardware::CommResult;
use crate::telemetry::relay::FrameSink;
use mavlink::common::{MavMessage, MavSeverity, STATUSTEXT_DATA};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Payload size of one STATUSTEXT frame
const CHUNK_SIZE: usize = 50;

/// Destination of guidance status messages
pub trait StatusSink: Send + Sync {
    fn send_status(&self, text: &str) -> CommResult<()>;
}

/// Emits status text as INFO `STATUSTEXT` frames.
///
/// Text that fits one frame goes out with id 0. Longer text is split on
/// character boundaries into 50-byte chunks that share a non-zero id and carry
/// increasing `chunk_seq`.
pub struct StatusTextSender {
    sink: Arc<dyn FrameSink>,
    next_id: AtomicU16,
}

impl StatusTextSender {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            next_id: AtomicU16::new(1),
        }
    }

    fn chunk_id(&self) -> u16 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Frames for `text`, in transmission order
    pub fn frames(&self, text: &str) -> Vec<STATUSTEXT_DATA> {
        let chunks = split_chunks(text);
        let id = if chunks.len() > 1 { self.chunk_id() } else { 0 };

        chunks
            .into_iter()
            .enumerate()
            .map(|(seq, chunk)| {
                let mut bytes = [0u8; CHUNK_SIZE];
                bytes[..chunk.len()].copy_from_slice(chunk.as_bytes());
                STATUSTEXT_DATA {
                    severity: MavSeverity::MAV_SEVERITY_INFO,
                    text: bytes.into(),
                    id,
                    chunk_seq: seq as u8,
                }
            })
            .collect()
    }
}

impl StatusSink for StatusTextSender {
    fn send_status(&self, text: &str) -> CommResult<()> {
        for frame in self.frames(text) {
            self.sink.send_frame(MavMessage::STATUSTEXT(frame))?;
        }
        Ok(())
    }
}

fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (index, ch) in text.char_indices() {
        if index + ch.len_utf8() - start > CHUNK_SIZE {
            chunks.push(&text[start..end]);
            start = end;
        }
        end = index + ch.len_utf8();
    }
    if start < text.len() || chunks.is_empty() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<MavMessage>>,
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&self, message: MavMessage) -> CommResult<()> {
            self.frames.lock().push(message);
            Ok(())
        }
    }

    #[test]
    fn test_short_text_is_one_frame() {
        let sink = Arc::new(RecordingSink::default());
        let sender = StatusTextSender::new(sink.clone());
        sender.send_status("Starting flight tests").unwrap();

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            MavMessage::STATUSTEXT(data) => {
                assert_eq!(data.id, 0);
                assert_eq!(data.chunk_seq, 0);
                assert_eq!(data.severity, MavSeverity::MAV_SEVERITY_INFO);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_long_text_is_chunked_under_one_id() {
        let sender = StatusTextSender::new(Arc::new(RecordingSink::default()));
        let text = "x".repeat(120);

        let frames = sender.frames(&text);
        assert_eq!(frames.len(), 3);
        assert_ne!(frames[0].id, 0);
        assert!(frames.iter().all(|f| f.id == frames[0].id));
        assert_eq!(frames.iter().map(|f| f.chunk_seq).collect::<Vec<_>>(), vec![0, 1, 2]);

        let next = sender.frames(&text);
        assert_ne!(next[0].id, frames[0].id);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "é".repeat(30);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), text);

        assert_eq!(split_chunks(""), vec![""]);
        assert_eq!(split_chunks(&"a".repeat(50)).len(), 1);
    }
}
