//! Frame server: accept loop and forwarding policy

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ClaimError;
use crate::config::CaptureConfig;
use crate::net::session::PeerSession;
use crate::reader::FrameReader;
use crate::{Result, StreamError};

/// How a forwarding session ended.
enum SessionEnd {
    /// The configured frame limit was reached; the stream is complete.
    LimitReached,
    /// The peer disconnected or a write failed; only this session dies.
    PeerLost,
    /// The frame channel closed underneath us; capture is shutting down.
    ChannelClosed,
    /// Out-of-band cancellation.
    Cancelled,
}

/// TCP server draining the frame channel to one peer at a time.
///
/// One peer is served at a time; connection attempts made meanwhile sit in
/// the OS accept backlog. Losing a peer ends that session only - the server
/// goes back to accepting, and the capture side never notices. The server
/// returns once a session completes the configured frame limit, the channel
/// closes, or it is cancelled.
pub struct FrameServer {
    listener: TcpListener,
    reader: FrameReader,
    frame_limit: u64,
    cancel: CancellationToken,
}

impl FrameServer {
    /// Bind the configured listen address.
    ///
    /// Bind/listen failures are startup failures and propagate to the
    /// caller; there is no session to degrade to yet.
    pub async fn bind(config: &CaptureConfig, reader: FrameReader) -> Result<Self> {
        let addr = config.listen_addr();
        let listener =
            TcpListener::bind(addr).await.map_err(|source| StreamError::Bind { addr, source })?;
        info!(%addr, frame_limit = config.frame_limit, "frame server listening");

        Ok(Self {
            listener,
            reader,
            frame_limit: config.frame_limit,
            cancel: CancellationToken::new(),
        })
    }

    /// Actual bound address (useful when the configured port is 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that cancels the server out-of-band, unblocking accept, claim,
    /// and in-progress writes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve until one session completes the frame limit, the channel
    /// closes, or the server is cancelled. Returns the frames sent on the
    /// final session.
    pub async fn run(self) -> Result<u64> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("server cancelled while awaiting a peer");
                    return Ok(0);
                }
                accepted = self.listener.accept() => {
                    accepted.map_err(|source| StreamError::Accept { source })?
                }
            };
            info!(%peer, "peer connected");

            let mut session = PeerSession::new(stream, peer);
            match self.serve(&mut session).await {
                SessionEnd::LimitReached => {
                    let sent = session.frames_sent();
                    info!(%peer, frames = sent, "frame limit reached, closing stream");
                    session.shutdown().await;
                    return Ok(sent);
                }
                SessionEnd::PeerLost => {
                    // Capture keeps running; await a future connection.
                    warn!(%peer, frames = session.frames_sent(), "peer lost, awaiting a new connection");
                    continue;
                }
                SessionEnd::ChannelClosed => {
                    let sent = session.frames_sent();
                    info!(%peer, frames = sent, "frame channel closed, ending stream");
                    session.shutdown().await;
                    return Ok(sent);
                }
                SessionEnd::Cancelled => {
                    info!(%peer, frames = session.frames_sent(), "server cancelled mid-session");
                    return Ok(session.frames_sent());
                }
            }
        }
    }

    /// Forward frames to one peer until its limit, its death, or shutdown.
    async fn serve(&self, session: &mut PeerSession) -> SessionEnd {
        while session.frames_sent() < self.frame_limit {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                claim = self.reader.read_blocking(None) => match claim {
                    Ok(frame) => frame,
                    Err(ClaimError::Closed) => return SessionEnd::ChannelClosed,
                    // Unreachable with an infinite wait; keep the loop honest
                    Err(ClaimError::Timeout) => continue,
                }
            };

            let sent = tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                sent = session.forward_frame(&frame) => sent,
            };
            if let Err(e) = sent {
                warn!(error = %e, "frame transmit failed");
                return SessionEnd::PeerLost;
            }
            debug!(
                sequence = frame.sequence,
                frames_sent = session.frames_sent(),
                limit = self.frame_limit,
                "frame delivered"
            );
        }
        SessionEnd::LimitReached
    }
}
