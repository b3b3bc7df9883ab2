//! TCP bridge: carries sync topics between a controller and a display
//! running as separate processes.
//!
//! DESIGN
//! ======
//! Each frame travels as a big-endian `u32` length followed by the encoded
//! frame bytes. A connection pumps one topic out and one topic in: the
//! controller sends `State` and receives `Viewport`, the display the
//! reverse. Inbound bytes are republished unchanged on the local bus, so
//! the local subscriber's seq check applies across the process boundary.
//!
//! On connect the outbound topic's latest frame is sent first, so a peer
//! that joins mid-session starts from the current snapshot.
//!
//! The reader runs on its own task because `read_exact` is not cancel-safe
//! and must not sit in a `select!` next to the writer.

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;

use std::io;
use std::time::Duration;

use frames::{MAX_FRAME_LEN, Topic};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::sync::SyncBus;

/// Pause between display reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// =============================================================================
// FRAMING
// =============================================================================

/// Write one length-prefixed frame.
///
/// # Errors
///
/// Socket errors, or `InvalidInput` for a frame over [`MAX_FRAME_LEN`].
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    if bytes.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("frame of {} bytes too large", bytes.len())));
    }
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Read one length-prefixed frame. `Ok(None)` on a clean close between frames.
///
/// # Errors
///
/// Socket errors, `UnexpectedEof` for a close mid-frame, or `InvalidData`
/// for a declared length over [`MAX_FRAME_LEN`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("peer declared {len}-byte frame")));
    }
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

// =============================================================================
// PUMP
// =============================================================================

/// Shuttle frames over `stream` until either side closes.
///
/// # Errors
///
/// The first socket or framing error from either direction.
pub async fn pump(stream: TcpStream, bus: SyncBus, outbound: Topic, inbound: Topic) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader_task = tokio::spawn(forward_inbound(reader, bus.clone(), inbound));

    let result = tokio::select! {
        joined = &mut reader_task => joined.unwrap_or_else(|e| Err(io::Error::other(e))),
        sent = forward_outbound(&mut writer, &bus, outbound) => sent,
    };
    reader_task.abort();
    result
}

async fn forward_inbound(mut reader: OwnedReadHalf, bus: SyncBus, topic: Topic) -> io::Result<()> {
    while let Some(bytes) = read_frame(&mut reader).await? {
        let receivers = bus.publish_raw(topic, bytes);
        debug!(topic = topic.as_str(), receivers, "bridge: frame in");
    }
    Ok(())
}

async fn forward_outbound(writer: &mut OwnedWriteHalf, bus: &SyncBus, topic: Topic) -> io::Result<()> {
    let mut rx = bus.subscribe_raw(topic);
    if let Some(latest) = bus.latest(topic) {
        forward_frame(writer, topic, &latest).await?;
    }
    loop {
        match rx.recv().await {
            Ok(bytes) => forward_frame(writer, topic, &bytes).await?,
            Err(RecvError::Lagged(skipped)) => {
                debug!(topic = topic.as_str(), skipped, "bridge: lagged; resending latest");
                if let Some(latest) = bus.latest(topic) {
                    forward_frame(writer, topic, &latest).await?;
                }
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Send one bus frame to the peer. A frame the peer would refuse is logged
/// and dropped so the link stays up for the next one.
async fn forward_frame<W: AsyncWrite + Unpin>(writer: &mut W, topic: Topic, bytes: &[u8]) -> io::Result<()> {
    if bytes.len() > MAX_FRAME_LEN {
        error!(
            topic = topic.as_str(),
            bytes = bytes.len() as u64,
            limit = MAX_FRAME_LEN as u64,
            "bridge: frame too large; skipped"
        );
        return Ok(());
    }
    write_frame(writer, bytes).await
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Controller side: accept display connections forever.
///
/// # Errors
///
/// Only if the listener cannot be bound.
pub async fn serve_controller(addr: &str, bus: SyncBus) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "sync bridge listening");
    accept_loop(listener, bus).await;
    Ok(())
}

async fn accept_loop(listener: TcpListener, bus: SyncBus) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "sync bridge accept failed");
                continue;
            }
        };
        info!(%peer, "display connected");
        let bus = bus.clone();
        tokio::spawn(async move {
            match pump(stream, bus, Topic::State, Topic::Viewport).await {
                Ok(()) => info!(%peer, "display disconnected"),
                Err(e) => warn!(%peer, error = %e, "display link failed"),
            }
        });
    }
}

/// Display side: connect to the controller, reconnecting whenever the link
/// drops. Runs until the surrounding task is cancelled.
pub async fn connect_display(addr: &str, bus: SyncBus) {
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!(addr, "connected to controller");
                match pump(stream, bus.clone(), Topic::Viewport, Topic::State).await {
                    Ok(()) => info!(addr, "controller closed the link"),
                    Err(e) => warn!(addr, error = %e, "controller link failed"),
                }
            }
            Err(e) => debug!(addr, error = %e, "controller not reachable yet"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
