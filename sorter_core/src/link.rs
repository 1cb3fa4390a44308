//! Host link over any line-oriented byte stream.
//!
//! Spawns a thread that owns the reader, pushes trimmed lines through a
//! bounded channel, and lets the control loop poll without blocking.
//! Writes happen on the caller's thread.
//!
//! Each `LineLink` spawns exactly one reader thread. Dropping the link
//! signals shutdown; the thread is joined when it has already returned
//! (EOF or error) and detached otherwise, since a read blocked on a tty
//! cannot be interrupted portably.
use crossbeam_channel as xch;
use sorter_traits::{DeviceError, HostLink};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Inbound lines buffered before the reader thread waits on the consumer.
const LINE_BACKLOG: usize = 64;

pub struct LineLink<W: Write> {
    rx: xch::Receiver<String>,
    writer: W,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl<W: Write> LineLink<W> {
    pub fn spawn<R: BufRead + Send + 'static>(mut reader: R, writer: W) -> Self {
        let (tx, rx) = xch::bounded(LINE_BACKLOG);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut buf = Vec::new();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("link reader received shutdown signal");
                    break;
                }
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => {
                        tracing::debug!("link reader reached end of input");
                        break;
                    }
                    Ok(_) => {
                        // line noise is dropped here; the reader keeps going
                        let Ok(text) = std::str::from_utf8(&buf) else {
                            tracing::debug!(len = buf.len(), "discarding non-UTF-8 line");
                            continue;
                        };
                        let line = text.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line.to_owned()).is_err() {
                            tracing::debug!("link consumer disconnected, exiting thread");
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "link read failed");
                        break;
                    }
                }
            }
            tracing::trace!("link reader thread exiting cleanly");
        });

        Self {
            rx,
            writer,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// True once the reader has stopped and every received line was consumed.
    pub fn is_closed(&self) -> bool {
        self.rx.is_empty()
            && self
                .join_handle
                .as_ref()
                .is_none_or(std::thread::JoinHandle::is_finished)
    }
}

impl<W: Write> HostLink for LineLink<W> {
    fn poll_line(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for LineLink<W> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(handle) = self.join_handle.take() {
            if !handle.is_finished() {
                tracing::trace!("link reader still blocked in read; detaching");
                return;
            }
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "link reader thread panicked during shutdown");
            }
        }
    }
}
