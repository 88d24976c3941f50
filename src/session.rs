//! The chat session loop.
//!
//! One session owns one connected socket plus the local input and output
//! streams, and multiplexes them in a single task: local input chunks are
//! framed as `Text` packets and sent to the peer, inbound packets are
//! deframed and `Text` payloads written verbatim to local output. The loop
//! runs until either side closes or an I/O failure ends the session.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tracing::debug;

use crate::buffer::RecvBuffer;
use crate::packet::{encode_packet, Header, PacketKind, PayloadTooLarge, HEADER_SIZE};

/// Upper bound on one local input chunk, and therefore on the payload of
/// any packet this side produces.
pub const LOCAL_CHUNK: usize = 1024;

/// How a session ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Local input reached end-of-input; the peer was told via a write-half
    /// shutdown.
    LocalClosed,
    /// The peer closed its end of the stream.
    PeerClosed,
}

/// A fatal session failure. End-of-stream on either side is not an error;
/// it surfaces as [`SessionEnd`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    PayloadTooLarge(#[from] PayloadTooLarge),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The stream ended with fewer payload bytes than the header declared.
    /// Partial packets are never kept; this always ends the session.
    #[error("truncated packet: header declared {declared} payload bytes, stream ended after {received}")]
    TruncatedPacket { declared: u16, received: usize },
}

#[derive(Debug, Clone, Copy)]
enum ReadState {
    Header { have: usize },
    Payload { header: Header, have: usize },
}

/// Incremental packet deframer.
///
/// Accumulates header and payload bytes across however many reads the
/// stream takes to deliver them, keeping its progress in `self` so the
/// read future can be dropped by `select!` between reads without losing
/// bytes. Payloads land in a single [`RecvBuffer`] reused for the whole
/// session.
struct FrameReader {
    state: ReadState,
    header: [u8; HEADER_SIZE],
    payload: RecvBuffer,
}

impl FrameReader {
    fn new() -> Self {
        Self {
            state: ReadState::Header { have: 0 },
            header: [0; HEADER_SIZE],
            payload: RecvBuffer::new(),
        }
    }

    /// Read until one complete packet is available or the stream ends.
    ///
    /// Returns `Ok(None)` when the stream ends before a complete header
    /// arrives (an orderly close, even if a few header bytes were already
    /// in). A stream that ends after a complete header is a
    /// [`SessionError::TruncatedPacket`].
    async fn next_packet<R>(&mut self, reader: &mut R) -> Result<Option<Header>, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match self.state {
                ReadState::Header { have } => {
                    let n = reader.read(&mut self.header[have..]).await?;
                    if n == 0 {
                        self.state = ReadState::Header { have: 0 };
                        return Ok(None);
                    }
                    if have + n < HEADER_SIZE {
                        self.state = ReadState::Header { have: have + n };
                        continue;
                    }
                    let header = Header::decode(self.header);
                    self.payload.ensure(header.length as usize);
                    self.state = ReadState::Payload { header, have: 0 };
                }
                ReadState::Payload { header, have } => {
                    let length = header.length as usize;
                    if have == length {
                        self.state = ReadState::Header { have: 0 };
                        return Ok(Some(header));
                    }
                    let dst = &mut self.payload.ensure(length)[have..];
                    let n = reader.read(dst).await?;
                    if n == 0 {
                        return Err(SessionError::TruncatedPacket {
                            declared: header.length,
                            received: have,
                        });
                    }
                    self.state = ReadState::Payload {
                        header,
                        have: have + n,
                    };
                }
            }
        }
    }

    /// Payload of the packet most recently returned by [`next_packet`].
    fn payload(&self, header: &Header) -> &[u8] {
        self.payload.filled(header.length as usize)
    }
}

/// Frame `payload` as one packet and write it to the socket.
///
/// Fails with [`PayloadTooLarge`] before writing anything when the payload
/// does not fit the length field.
pub async fn send_packet<W>(
    writer: &mut W,
    kind: PacketKind,
    flags: u8,
    payload: &[u8],
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_packet(kind, flags, payload)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Run one chat session to completion.
///
/// The session owns `socket` for its lifetime and releases it exactly once,
/// on every exit path. Generic over the streams so tests can substitute
/// in-memory pipes for stdin, stdout, and the TCP connection.
pub async fn run_session<S, I, O>(
    socket: S,
    mut input: I,
    mut output: O,
) -> Result<SessionEnd, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut sock_rx, mut sock_tx) = tokio::io::split(socket);
    let mut frames = FrameReader::new();
    let mut chunk = [0u8; LOCAL_CHUNK];

    loop {
        select! {
            // Local input before the socket, the same check order the
            // original protocol defined per iteration.
            biased;

            read = input.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    // Local end-of-input: let the peer see end-of-stream.
                    sock_tx.shutdown().await?;
                    return Ok(SessionEnd::LocalClosed);
                }
                send_packet(&mut sock_tx, PacketKind::Text, 0, &chunk[..n]).await?;
            }

            packet = frames.next_packet(&mut sock_rx) => {
                let Some(header) = packet? else {
                    return Ok(SessionEnd::PeerClosed);
                };
                dispatch(header, frames.payload(&header), &mut output).await?;
            }
        }
    }
}

/// Hand one complete packet to its consumer.
///
/// `Sound` is reserved and `Unknown` comes from a newer peer; both are
/// consumed and dropped so the stream stays aligned.
async fn dispatch<W>(header: Header, payload: &[u8], output: &mut W) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    match header.kind {
        PacketKind::Text => {
            output.write_all(payload).await?;
            output.flush().await?;
        }
        PacketKind::Sound => {
            debug!(length = header.length, "ignoring reserved sound packet");
        }
        PacketKind::Unknown(tag) => {
            debug!(tag, length = header.length, "ignoring packet of unknown kind");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    struct Harness {
        session: JoinHandle<Result<SessionEnd, SessionError>>,
        peer: DuplexStream,
        input: DuplexStream,
        output: DuplexStream,
    }

    fn start() -> Harness {
        let (socket, peer) = duplex(4096);
        let (input, input_rx) = duplex(256);
        let (output_tx, output) = duplex(256);
        let session = tokio::spawn(run_session(socket, input_rx, output_tx));
        Harness {
            session,
            peer,
            input,
            output,
        }
    }

    #[tokio::test]
    async fn local_input_is_framed_as_text() {
        let mut harness = start();

        harness.input.write_all(b"hello").await.expect("write input");

        let mut framed = [0u8; HEADER_SIZE + 5];
        harness
            .peer
            .read_exact(&mut framed)
            .await
            .expect("read framed packet");
        assert_eq!(&framed, b"\x05\x00\x00\x00hello");
    }

    #[tokio::test]
    async fn inbound_text_reaches_local_output() {
        let mut harness = start();

        let packet = encode_packet(PacketKind::Text, 0, b"hi\n").expect("encode");
        harness.peer.write_all(&packet).await.expect("write packet");

        let mut line = [0u8; 3];
        harness
            .output
            .read_exact(&mut line)
            .await
            .expect("read local output");
        assert_eq!(&line, b"hi\n");
    }

    #[tokio::test]
    async fn local_eof_ends_session_and_signals_peer() {
        let mut harness = start();

        drop(harness.input);
        let end = harness.session.await.expect("join").expect("session");
        assert_eq!(end, SessionEnd::LocalClosed);

        // Write half was shut down, so the peer observes end-of-stream.
        let n = harness.peer.read(&mut [0u8; 8]).await.expect("peer read");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn peer_eof_ends_session_cleanly() {
        let harness = start();

        drop(harness.peer);
        let end = harness.session.await.expect("join").expect("session");
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn partial_header_at_eof_is_an_orderly_close() {
        let mut harness = start();

        harness.peer.write_all(&[0x05, 0x00]).await.expect("write");
        drop(harness.peer);

        let end = harness.session.await.expect("join").expect("session");
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn truncated_payload_fails_the_session() {
        let mut harness = start();

        let header = Header::new(50, PacketKind::Text, 0);
        harness.peer.write_all(&header.encode()).await.expect("write header");
        harness.peer.write_all(&[0xAB; 10]).await.expect("write partial payload");
        drop(harness.peer);

        let err = harness.session.await.expect("join").unwrap_err();
        assert!(matches!(
            err,
            SessionError::TruncatedPacket {
                declared: 50,
                received: 10
            }
        ));

        // Nothing was dispatched from the partial packet.
        let n = harness.output.read(&mut [0u8; 8]).await.expect("output read");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn reserved_and_unknown_kinds_are_skipped() {
        let mut harness = start();

        let sound = encode_packet(PacketKind::Sound, 0, b"pretend audio").expect("encode");
        let unknown = encode_packet(PacketKind::Unknown(7), 0, b"mystery").expect("encode");
        let text = encode_packet(PacketKind::Text, 0, b"still here").expect("encode");
        harness.peer.write_all(&sound).await.expect("write sound");
        harness.peer.write_all(&unknown).await.expect("write unknown");
        harness.peer.write_all(&text).await.expect("write text");

        // Only the text payload comes out, proving the two packets before
        // it were consumed whole and dropped.
        let mut got = [0u8; 10];
        harness.output.read_exact(&mut got).await.expect("read output");
        assert_eq!(&got, b"still here");
    }

    #[tokio::test]
    async fn oversized_payload_writes_nothing() {
        let mut sink: Vec<u8> = Vec::new();
        let payload = vec![0u8; 70_000];

        let err = send_packet(&mut sink, PacketKind::Text, 0, &payload)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::PayloadTooLarge(PayloadTooLarge { length: 70_000 })
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn zero_length_packet_dispatches_nothing_and_keeps_going() {
        let mut harness = start();

        let empty = encode_packet(PacketKind::Text, 0, b"").expect("encode");
        let text = encode_packet(PacketKind::Text, 0, b"after").expect("encode");
        harness.peer.write_all(&empty).await.expect("write empty");
        harness.peer.write_all(&text).await.expect("write text");

        let mut got = [0u8; 5];
        harness.output.read_exact(&mut got).await.expect("read output");
        assert_eq!(&got, b"after");
    }

    #[tokio::test]
    async fn flags_round_trip_through_the_loop() {
        let mut harness = start();

        // Flags have no assigned bits; an arbitrary value must not disturb
        // delivery of the payload.
        let packet = encode_packet(PacketKind::Text, 0xA5, b"flagged").expect("encode");
        harness.peer.write_all(&packet).await.expect("write");

        let mut got = [0u8; 7];
        harness.output.read_exact(&mut got).await.expect("read output");
        assert_eq!(&got, b"flagged");
    }
}
