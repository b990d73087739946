//! Per-peer forwarding session

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::types::Frame;
use crate::{Result, StreamError};

/// One accepted peer: the socket, a send cursor, and the count of frames
/// forwarded on this connection.
///
/// The session exclusively owns its socket for its lifetime; nothing else
/// touches it.
#[derive(Debug)]
pub struct PeerSession {
    stream: TcpStream,
    peer: SocketAddr,
    frames_sent: u64,
}

impl PeerSession {
    /// Wrap an accepted connection.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer, frames_sent: 0 }
    }

    /// Address of the connected peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Complete frames forwarded on this connection so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Transmit one complete frame, retrying partial writes until every
    /// byte is on the wire. A frame counts as sent only once it is whole.
    pub async fn forward_frame(&mut self, frame: &Frame) -> Result<()> {
        send_all(&mut self.stream, &frame.data)
            .await
            .map_err(|source| StreamError::transmit(self.peer, self.frames_sent, source))?;
        self.frames_sent += 1;
        trace!(peer = %self.peer, sequence = frame.sequence, bytes = frame.len(), "frame forwarded");
        Ok(())
    }

    /// Flush and close the write half gracefully.
    pub async fn shutdown(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Write `payload` in full, looping over partial writes.
///
/// The transport may accept fewer bytes than offered per call; the cursor
/// advances by whatever was taken and the remainder is retried. A zero-byte
/// write means the peer stopped accepting data mid-frame and surfaces as
/// `WriteZero` - a short write is never a complete frame.
pub(crate) async fn send_all<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;
    while sent < payload.len() {
        let n = writer.write(&payload[sent..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "peer stopped accepting data mid-frame",
            ));
        }
        sent += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Transport that accepts at most `cap` bytes per write call.
    struct ChunkedWriter {
        cap: usize,
        written: Vec<u8>,
    }

    impl ChunkedWriter {
        fn new(cap: usize) -> Self {
            Self { cap, written: Vec::new() }
        }
    }

    impl AsyncWrite for ChunkedWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = buf.len().min(this.cap);
            this.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Transport that dies after accepting `accept` bytes.
    struct DyingWriter {
        accept: usize,
    }

    impl AsyncWrite for DyingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.accept == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")));
            }
            let n = buf.len().min(this.accept);
            this.accept -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn session_forwards_frames_over_a_real_socket() {
        use crate::types::Frame;
        use std::time::Instant;
        use tokio::io::AsyncReadExt;
        use tokio::net::{TcpListener, TcpStream};

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("bound address");

        let mut client = TcpStream::connect(addr).await.expect("connect");
        let (stream, peer) = listener.accept().await.expect("accept");

        let mut session = PeerSession::new(stream, peer);
        assert_eq!(session.frames_sent(), 0);
        assert_eq!(session.peer(), peer);

        let frame = Frame::new(vec![0xC3u8; 256], 1, Instant::now());
        session.forward_frame(&frame).await.expect("forward over loopback");
        assert_eq!(session.frames_sent(), 1);
        session.shutdown().await;

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.expect("drain the stream");
        assert_eq!(received, vec![0xC3u8; 256]);
    }

    #[tokio::test]
    async fn full_frame_crosses_a_fragmenting_transport() {
        // The reference frame size through 4096-byte fragments: every byte
        // must arrive, none dropped or duplicated.
        let payload: Vec<u8> = (0..614_400u32).map(|i| (i % 251) as u8).collect();
        let mut writer = ChunkedWriter::new(4096);

        send_all(&mut writer, &payload).await.expect("send must complete");

        assert_eq!(writer.written.len(), 614_400);
        assert_eq!(writer.written, payload);
    }

    #[tokio::test]
    async fn single_byte_fragments_still_complete() {
        let payload = b"frame payload".to_vec();
        let mut writer = ChunkedWriter::new(1);
        send_all(&mut writer, &payload).await.expect("send must complete");
        assert_eq!(writer.written, payload);
    }

    #[tokio::test]
    async fn mid_frame_failure_surfaces_the_io_error() {
        let payload = vec![7u8; 10_000];
        let mut writer = DyingWriter { accept: 1500 };
        let err = send_all(&mut writer, &payload).await.expect_err("transport died mid-frame");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_fragmentation_never_corrupts_a_frame(
                cap in 1usize..10_000usize,
                len in 1usize..100_000usize
            ) {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let mut writer = ChunkedWriter::new(cap);

                futures::executor::block_on(send_all(&mut writer, &payload)).unwrap();
                prop_assert_eq!(&writer.written, &payload);
            }
        }
    }
}
