use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::models::Notice;

const MAX_SCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decode failed: {0}")]
    Frame(String),
    #[error("decode source closed")]
    Exhausted,
}

#[async_trait]
pub trait CodeDecoder: Send {
    async fn decode(&mut self) -> Result<Option<String>, DecodeError>;
}

#[derive(Debug)]
pub struct ChannelDecoder {
    rx: mpsc::Receiver<String>,
}

impl ChannelDecoder {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl CodeDecoder for ChannelDecoder {
    async fn decode(&mut self) -> Result<Option<String>, DecodeError> {
        self.rx.recv().await.map(Some).ok_or(DecodeError::Exhausted)
    }
}

#[derive(Debug)]
pub struct LineDecoder<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CodeDecoder for LineDecoder<R> {
    async fn decode(&mut self) -> Result<Option<String>, DecodeError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                Ok((!line.is_empty()).then(|| line.to_string()))
            }
            Ok(None) => Err(DecodeError::Exhausted),
            Err(e) => Err(DecodeError::Frame(e.to_string())),
        }
    }
}

pub struct StreamDecoder<S> {
    stream: S,
}

impl<S> StreamDecoder<S>
where
    S: Stream<Item = Result<String, String>> + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> CodeDecoder for StreamDecoder<S>
where
    S: Stream<Item = Result<String, String>> + Unpin + Send,
{
    async fn decode(&mut self) -> Result<Option<String>, DecodeError> {
        match self.stream.next().await {
            Some(Ok(code)) => Ok(Some(code)),
            Some(Err(e)) => Err(DecodeError::Frame(e)),
            None => Err(DecodeError::Exhausted),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanControl {
    Running,
    Paused,
    Closed,
}

// dropping every handle dismisses the feed
#[derive(Debug, Clone)]
pub struct ScanHandle {
    tx: Arc<watch::Sender<ScanControl>>,
}

impl ScanHandle {
    pub fn pause(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ScanControl::Running {
                *state = ScanControl::Paused;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ScanControl::Paused {
                *state = ScanControl::Running;
                true
            } else {
                false
            }
        });
    }

    pub fn close(&self) {
        self.tx.send_if_modified(|state| {
            let changed = *state != ScanControl::Closed;
            *state = ScanControl::Closed;
            changed
        });
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow() == ScanControl::Closed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Candidate(String),
    Duplicate(String),
}

impl ScanEvent {
    pub fn code(&self) -> &str {
        match self {
            ScanEvent::Candidate(code) | ScanEvent::Duplicate(code) => code,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            ScanEvent::Candidate(code) => {
                Notice::info("Successfully scanned Item!", format!("QR Result: {}", code))
            }
            ScanEvent::Duplicate(code) => Notice::error(
                "Scanned Item is already in the list!",
                format!("QR Result: {}", code),
            ),
        }
    }
}

enum Wake<T> {
    Ready(T),
    Control { alive: bool },
}

pub struct ScanFeed<D> {
    decoder: D,
    interval: Duration,
    control: watch::Receiver<ScanControl>,
    candidate: Option<String>,
    next_attempt: Instant,
    exhausted: bool,
}

impl<D: CodeDecoder> ScanFeed<D> {
    pub fn new(decoder: D, interval: Duration) -> (Self, ScanHandle) {
        let (tx, rx) = watch::channel(ScanControl::Running);
        let feed = Self {
            decoder,
            interval: interval.min(MAX_SCAN_INTERVAL),
            control: rx,
            candidate: None,
            next_attempt: Instant::now(),
            exhausted: false,
        };
        (feed, ScanHandle { tx: Arc::new(tx) })
    }

    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    pub async fn next_event(&mut self, known: &HashSet<String>) -> Option<ScanEvent> {
        loop {
            let state = *self.control.borrow_and_update();
            match state {
                ScanControl::Closed => return None,
                ScanControl::Paused => {
                    if self.control.changed().await.is_err() {
                        return None;
                    }
                    continue;
                }
                ScanControl::Running => {}
            }

            // decoding stays paused until the pending read is confirmed or discarded
            if let Some(code) = &self.candidate {
                return Some(ScanEvent::Candidate(code.clone()));
            }
            if self.exhausted {
                return None;
            }

            let wake = tokio::select! {
                _ = sleep_until(self.next_attempt) => Wake::Ready(()),
                changed = self.control.changed() => Wake::Control { alive: changed.is_ok() },
            };
            match wake {
                Wake::Ready(()) => {}
                Wake::Control { alive: false } => return None,
                Wake::Control { alive: true } => continue,
            }

            let wake = tokio::select! {
                result = self.decoder.decode() => Wake::Ready(result),
                changed = self.control.changed() => Wake::Control { alive: changed.is_ok() },
            };
            let decoded = match wake {
                Wake::Ready(result) => result,
                Wake::Control { alive: false } => return None,
                Wake::Control { alive: true } => continue,
            };
            let now = Instant::now();
            self.next_attempt = now.checked_add(self.interval).unwrap_or(now);

            if *self.control.borrow() != ScanControl::Running {
                continue;
            }

            match decoded {
                Ok(Some(code)) => {
                    let code = code.trim().to_string();
                    if code.is_empty() {
                        continue;
                    }
                    if known.contains(&code) {
                        debug!("Ignoring duplicate scan of {}", code);
                        return Some(ScanEvent::Duplicate(code));
                    }
                    self.candidate = Some(code.clone());
                    return Some(ScanEvent::Candidate(code));
                }
                Ok(None) => continue,
                Err(DecodeError::Frame(e)) => {
                    debug!("Scan attempt failed: {}", e);
                    continue;
                }
                Err(DecodeError::Exhausted) => {
                    info!("Scan source closed");
                    self.exhausted = true;
                    continue;
                }
            }
        }
    }

    pub fn confirm(&mut self, known: &HashSet<String>) -> Option<String> {
        let code = self.candidate.take()?;
        if known.contains(&code) {
            debug!("Dropping candidate {} already in the list", code);
            return None;
        }
        Some(code)
    }

    pub fn rescan(&mut self) {
        self.candidate = None;
    }
}
