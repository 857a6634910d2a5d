/// Output sink with backpressure.
///
/// A writer thread owns the terminal output. Exactly one frame buffer
/// circulates: the loop takes it, encodes a frame, submits it; the writer
/// writes it, flushes, and sends it back. While the writer still holds the
/// buffer, `try_acquire` returns `None` and the loop skips rendering for
/// that tick but keeps simulating. Frames never queue up behind a slow
/// consumer.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::debug;

pub struct FrameSink {
    to_writer: Option<SyncSender<Vec<u8>>>,
    returned: Receiver<Vec<u8>>,
    spare: Option<Vec<u8>>,
    handle: Option<JoinHandle<io::Result<()>>>,
    /// Ticks on which no buffer was available.
    pub skipped: u64,
}

impl FrameSink {
    pub fn spawn<W: Write + Send + 'static>(mut out: W) -> io::Result<Self> {
        let (to_writer, frames) = mpsc::sync_channel::<Vec<u8>>(1);
        let (give_back, returned) = mpsc::channel::<Vec<u8>>();
        let handle = thread::Builder::new().name("frame-writer".into()).spawn(move || {
            for frame in frames {
                out.write_all(&frame)?;
                out.flush()?;
                if give_back.send(frame).is_err() {
                    break;
                }
            }
            Ok(())
        })?;
        Ok(FrameSink {
            to_writer: Some(to_writer),
            returned,
            spare: Some(Vec::new()),
            handle: Some(handle),
            skipped: 0,
        })
    }

    /// The frame buffer, if the writer has finished with it.
    pub fn try_acquire(&mut self) -> Option<Vec<u8>> {
        if self.spare.is_none() {
            match self.returned.try_recv() {
                Ok(buf) => self.spare = Some(buf),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }
        let buf = self.spare.take();
        if buf.is_none() {
            self.skipped += 1;
        }
        buf
    }

    /// Hand an encoded frame to the writer.
    pub fn submit(&mut self, frame: Vec<u8>) -> io::Result<()> {
        let Some(tx) = &self.to_writer else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "frame writer closed"));
        };
        tx.send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "frame writer stopped"))
    }

    /// Let the writer drain, then stop it and surface any write error.
    pub fn finish(mut self) -> io::Result<()> {
        self.to_writer = None;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        debug!(skipped = self.skipped, "frame writer shutting down");
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::Other, "frame writer panicked")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Blocks every write until the test releases it.
    struct Gate(Arc<Mutex<()>>);

    impl Write for Gate {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let _held = self.0.lock().unwrap();
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn frames_reach_the_writer_and_buffer_returns() {
        let sink_out = Shared(Arc::new(Mutex::new(Vec::new())));
        let mut sink = FrameSink::spawn(sink_out.clone()).unwrap();

        let mut buf = sink.try_acquire().unwrap();
        buf.extend_from_slice(b"one");
        sink.submit(buf).unwrap();

        let mut buf = loop {
            if let Some(b) = sink.try_acquire() {
                break b;
            }
            thread::sleep(Duration::from_millis(1));
        };
        buf.clear();
        buf.extend_from_slice(b"two");
        sink.submit(buf).unwrap();
        sink.finish().unwrap();

        assert_eq!(&*sink_out.0.lock().unwrap(), b"onetwo");
    }

    #[test]
    fn busy_writer_means_skip() {
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();
        let mut sink = FrameSink::spawn(Gate(gate.clone())).unwrap();

        let mut buf = sink.try_acquire().unwrap();
        buf.push(b'x');
        sink.submit(buf).unwrap();

        for _ in 0..5 {
            assert!(sink.try_acquire().is_none());
        }
        assert_eq!(sink.skipped, 5);

        drop(held);
        sink.finish().unwrap();
    }
}
