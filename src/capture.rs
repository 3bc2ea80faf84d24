use std::io::Write;
use std::sync::mpsc::{self, Receiver, Sender};

/// In-memory sink for the runner's stdout.
///
/// Writers push each chunk over an unbounded channel, so the producer never
/// blocks. The pipe owner drains the channel into one byte buffer and decodes
/// it once on [`CapturePipe::close`], which keeps multi-byte characters intact
/// even when a write splits them.
pub struct CapturePipe {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    buffer: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl CapturePipe {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        Self {
            tx,
            rx,
            buffer: Vec::new(),
        }
    }

    pub fn writer(&self) -> PipeWriter {
        PipeWriter {
            tx: self.tx.clone(),
        }
    }

    /// Moves every chunk delivered so far into the accumulator.
    pub fn drain(&mut self) {
        for chunk in self.rx.try_iter() {
            self.buffer.extend_from_slice(&chunk);
        }
    }

    #[cfg(test)]
    fn captured_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drains what has arrived and returns the accumulated text.
    ///
    /// Writer clones still held elsewhere are not awaited; anything they send
    /// afterwards is dropped.
    pub fn close(mut self) -> String {
        self.drain();
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

impl Default for CapturePipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !buf.is_empty() {
            // closed pipe: the chunk is discarded, the producer keeps going
            let _ = self.tx.send(buf.to_vec());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/capture_tests.rs"]
mod tests;
