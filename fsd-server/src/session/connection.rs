//! One TCP client: a reader task framing inbound lines and a writer task
//! coalescing outbound packets. Both tasks share a cancellation token; the
//! first framing violation, deadline or socket error tears the pair down.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::wire::{ErrorCode, FsdError, MAX_PACKET_LEN, PACKET_DELIMITER};

const READ_DEADLINE: Duration = Duration::from_secs(10);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const FLUSH_INTERVAL: Duration = Duration::from_millis(50);
const WRITER_QUEUE: usize = 64;

/// When set, every write flushes as soon as it is written instead of
/// waiting out the coalescing interval. Flipped on by tests and by
/// deployments that prefer latency over syscall count.
static ALWAYS_IMMEDIATE: AtomicBool = AtomicBool::new(false);

pub fn set_always_immediate(enabled: bool) {
    ALWAYS_IMMEDIATE.store(enabled, Ordering::Relaxed);
}

struct WritePayload {
    packet: String,
    immediate: bool,
}

pub struct Connection {
    peer: SocketAddr,
    cancel: CancellationToken,
    writer_tx: mpsc::Sender<WritePayload>,
    reader_rx: Mutex<mpsc::Receiver<String>>,
}

impl Connection {
    /// Takes ownership of the socket and spawns the reader/writer pair.
    pub fn spawn(stream: TcpStream, cancel: CancellationToken) -> io::Result<Arc<Self>> {
        let peer = stream.peer_addr()?;
        // Bounded linger so a kill still flushes the final packet without
        // the close blocking forever.
        stream.set_linger(Some(Duration::from_secs(1)))?;
        let (read_half, write_half) = stream.into_split();

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_QUEUE);
        let (reader_tx, reader_rx) = mpsc::channel(1);

        tokio::spawn(run_writer(write_half, writer_rx, cancel.clone()));
        tokio::spawn(run_reader(
            read_half,
            reader_tx,
            writer_tx.clone(),
            cancel.clone(),
        ));

        Ok(Arc::new(Self {
            peer,
            cancel,
            writer_tx,
            reader_rx: Mutex::new(reader_rx),
        }))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next framed packet, CRLF included. `None` once the connection is
    /// going away.
    pub async fn read_packet(&self) -> Option<String> {
        let mut rx = self.reader_rx.lock().await;
        tokio::select! {
            packet = rx.recv() => packet,
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Queues a packet for the writer. Blocks when the writer is backed up,
    /// which in turn stalls the event loop feeding it.
    pub async fn write_packet(&self, packet: impl Into<String>, immediate: bool) {
        let payload = WritePayload {
            packet: packet.into(),
            immediate: immediate || ALWAYS_IMMEDIATE.load(Ordering::Relaxed),
        };
        if self.writer_tx.send(payload).await.is_err() {
            self.cancel.cancel();
        }
    }
}

/// Reads one CRLF line, erroring out rather than buffering past the packet
/// size cap.
async fn read_framed(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
) -> io::Result<usize> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(buf.len());
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            return Ok(buf.len());
        }
        let n = available.len();
        buf.extend_from_slice(available);
        reader.consume(n);
        if buf.len() > MAX_PACKET_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "packet too long"));
        }
    }
}

async fn run_reader(
    read_half: OwnedReadHalf,
    reader_tx: mpsc::Sender<String>,
    writer_tx: mpsc::Sender<WritePayload>,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(512);

    let framing_error = loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break None,
            read = time::timeout(READ_DEADLINE, read_framed(&mut reader, &mut buf)) => read,
        };
        let n = match read {
            Err(_elapsed) => {
                debug!("read deadline exceeded");
                break None;
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                break Some("packet too long");
            }
            Ok(Err(e)) => {
                debug!(error = %e, "read failed");
                break None;
            }
            Ok(Ok(0)) => break None,
            Ok(Ok(n)) => n,
        };
        if n > MAX_PACKET_LEN {
            break Some("packet too long");
        }
        if !buf.ends_with(PACKET_DELIMITER.as_bytes()) {
            break Some("packet not CRLF terminated");
        }
        let Ok(line) = String::from_utf8(std::mem::take(&mut buf)) else {
            break Some("packet not valid text");
        };
        if reader_tx.send(line).await.is_err() {
            break None;
        }
    };

    if let Some(message) = framing_error {
        let err = FsdError::new(ErrorCode::Syntax, "", message);
        let _ = writer_tx
            .send(WritePayload {
                packet: err.serialize(),
                immediate: true,
            })
            .await;
    }
    cancel.cancel();
}

async fn run_writer(
    write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<WritePayload>,
    cancel: CancellationToken,
) {
    let mut writer = BufWriter::new(write_half);
    let flush_timer = time::sleep(FLUSH_INTERVAL);
    tokio::pin!(flush_timer);
    let mut dirty = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                if write_payload(&mut writer, &payload).await.is_err() {
                    cancel.cancel();
                    return;
                }
                if payload.immediate {
                    if time::timeout(WRITE_DEADLINE, writer.flush()).await.is_err() {
                        cancel.cancel();
                        return;
                    }
                    dirty = false;
                } else if !dirty {
                    dirty = true;
                    flush_timer.as_mut().reset(Instant::now() + FLUSH_INTERVAL);
                }
            }
            _ = &mut flush_timer, if dirty => {
                if writer.flush().await.is_err() {
                    cancel.cancel();
                    return;
                }
                dirty = false;
            }
        }
    }

    // Drain anything queued before the cancellation won the race (the kill
    // packet takes this path), then flush and let linger do the rest.
    while let Ok(payload) = rx.try_recv() {
        if write_payload(&mut writer, &payload).await.is_err() {
            break;
        }
    }
    let _ = time::timeout(WRITE_DEADLINE, writer.flush()).await;
    cancel.cancel();
}

async fn write_payload(
    writer: &mut BufWriter<OwnedWriteHalf>,
    payload: &WritePayload,
) -> io::Result<()> {
    match time::timeout(WRITE_DEADLINE, writer.write_all(payload.packet.as_bytes())).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write deadline")),
    }
}
