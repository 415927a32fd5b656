//! Session management
//!
//! Drives a byte source, normally the read side of a pty, through the VT
//! parser. A reader thread pulls chunks off the source and sends them over a
//! channel; the session owner feeds them into the terminal state in arrival
//! order.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::term::{EncodingMode, TermError, TermEvent, TerminalState, VtParser};

/// Size of a single read from the source
const READ_BUFFER_SIZE: usize = 4096;

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output data was processed (state updated)
    Output,
    /// The source reached end of stream or failed
    Exited,
    /// Read error, reported once
    Error(String),
    /// Title changed
    TitleChanged(String),
}

/// What the reader thread sends
#[derive(Debug)]
enum ReaderMessage {
    Data(Vec<u8>),
    Failed(String),
}

/// A terminal session fed by one byte source
pub struct Session {
    /// Terminal state
    pub state: TerminalState,
    /// VT parser
    parser: VtParser,
    /// Set while the reader thread is alive
    running: Arc<AtomicBool>,
    /// Reader thread handle
    reader_thread: Option<JoinHandle<()>>,
    /// Channel to receive source output
    output_rx: Option<Receiver<ReaderMessage>>,
}

impl Session {
    /// Create a UTF-8 session
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_encoding(cols, rows, EncodingMode::Utf8)
    }

    pub fn with_encoding(cols: u16, rows: u16, encoding: EncodingMode) -> Self {
        Self {
            state: TerminalState::new(cols, rows),
            parser: VtParser::with_encoding(encoding),
            running: Arc::new(AtomicBool::new(false)),
            reader_thread: None,
            output_rx: None,
        }
    }

    /// Start reading from `reader` on a background thread
    pub fn start<R>(&mut self, reader: R) -> std::io::Result<()>
    where
        R: Read + Send + 'static,
    {
        // A previous source is abandoned
        self.stop();

        // Each reader gets its own flag; an abandoned one may still be alive
        let (tx, rx) = mpsc::channel::<ReaderMessage>();
        self.running = Arc::new(AtomicBool::new(true));
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("vtinterp-reader".to_string())
            .spawn(move || read_loop(reader, tx, running));

        match handle {
            Ok(handle) => {
                info!("Session started ({}x{})", self.state.cols, self.state.rows);
                self.reader_thread = Some(handle);
                self.output_rx = Some(rx);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Check if the reader thread is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the source has ended and every chunk has been processed
    pub fn has_exited(&self) -> bool {
        self.output_rx.is_none() && !self.is_running()
    }

    /// Process whatever output has arrived (non-blocking)
    pub fn process_output(&mut self) -> Vec<SessionEvent> {
        let Some(rx) = &self.output_rx else {
            return Vec::new();
        };

        let mut messages = Vec::new();
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        self.handle_messages(messages, disconnected)
    }

    /// Block until at least one chunk arrives or the source ends, then
    /// process everything available
    pub fn wait_output(&mut self) -> Vec<SessionEvent> {
        let Some(rx) = &self.output_rx else {
            return Vec::new();
        };

        match rx.recv() {
            Ok(message) => {
                let mut events = self.handle_messages(vec![message], false);
                for event in self.process_output() {
                    if event == SessionEvent::Output && events.contains(&event) {
                        continue;
                    }
                    events.push(event);
                }
                events
            }
            Err(_) => self.handle_messages(Vec::new(), true),
        }
    }

    fn handle_messages(&mut self, messages: Vec<ReaderMessage>, disconnected: bool) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let title = self.state.title.clone();

        let mut processed = false;
        for message in messages {
            match message {
                ReaderMessage::Data(data) => {
                    self.feed_bytes(&data);
                    processed = true;
                }
                ReaderMessage::Failed(e) => events.push(SessionEvent::Error(e)),
            }
        }

        if processed {
            events.insert(0, SessionEvent::Output);
        }
        if self.state.title != title {
            events.push(SessionEvent::TitleChanged(self.state.title.clone()));
        }

        if disconnected {
            // The sender is gone, so the reader has returned
            self.output_rx = None;
            if let Some(handle) = self.reader_thread.take() {
                join(handle);
            }
            info!("Session output ended");
            events.push(SessionEvent::Exited);
        }

        events
    }

    /// Feed raw bytes into the terminal
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.parser.feed(bytes, &mut self.state);
    }

    /// Drain pending terminal events
    pub fn take_events(&mut self) -> Vec<TermEvent> {
        self.state.take_events()
    }

    /// Change the encoding; terminal state is kept
    pub fn set_encoding(&mut self, encoding: EncodingMode) {
        self.parser.set_encoding(encoding);
    }

    pub fn set_encoding_name(&mut self, name: &str) -> Result<(), TermError> {
        self.parser.set_encoding_name(name)
    }

    pub fn encoding(&self) -> Option<EncodingMode> {
        self.parser.encoding()
    }

    /// Get the terminal title
    pub fn title(&self) -> &str {
        &self.state.title
    }

    /// Drop the channel and reap the reader if it has finished.
    ///
    /// A reader still blocked in `read` cannot be interrupted; it is left
    /// to exit on its own once its next send fails.
    fn stop(&mut self) {
        self.output_rx = None;
        let Some(handle) = self.reader_thread.take() else {
            return;
        };

        if handle.is_finished() {
            join(handle);
        } else {
            debug!("Detaching reader thread blocked in read");
        }
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("Reader thread panicked");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop<R: Read>(mut reader: R, tx: Sender<ReaderMessage>, running: Arc<AtomicBool>) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("Reader reached end of stream");
                break;
            }
            Ok(n) => {
                if tx.send(ReaderMessage::Data(buffer[..n].to_vec())).is_err() {
                    // Session dropped
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Read error: {}", e);
                let _ = tx.send(ReaderMessage::Failed(e.to_string()));
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}
