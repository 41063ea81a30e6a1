//! Per-direction transfer buffers.
//!
//! A [`TransferBuffer`] sits between a source (UART or network client) and
//! its destination. Freshly read bytes are accumulated, complete packets are
//! cut out with the [`packet`](crate::packet) codec and forwarded verbatim,
//! and everything that happens along the way is counted in
//! [`TransferStats`].
//!
//! All writes made by one [`TransferBuffer::forward`] call share a single
//! deadline. Once it passes, the destination is treated as stalled for the
//! rest of the call and the remaining packets are dropped and counted as
//! write errors. A frame cut short by the deadline is kept and finished
//! before anything else goes to the destination, so framing survives a
//! slow reader.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, map_io_error};
use crate::packet::{self, DecodeResult, MAX_PACKET_SIZE, Packet};

/// Default deadline for the writes of one forward call.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Cumulative counters for one transfer direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Complete packets decoded.
    pub valid_packets: u64,
    /// Garbage runs and oversized packets discarded.
    pub invalid_packets: u64,
    /// Failed, timed-out or dropped writes to the destination.
    pub write_errors: u64,
    /// Failed reads from the source.
    pub read_errors: u64,
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valid={} invalid={} write_errors={} read_errors={}",
            self.valid_packets, self.invalid_packets, self.write_errors, self.read_errors
        )
    }
}

/// What a call to [`TransferBuffer::forward`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// No packet was completed by these bytes.
    Incomplete,
    /// Packets completed by these bytes, in arrival order. Never empty.
    Packets(Vec<Packet>),
    /// The source delivered zero bytes: the peer closed.
    EndOfStream,
}

impl TransferOutcome {
    /// The last packet completed, if any.
    pub fn last_packet(&self) -> Option<&Packet> {
        match self {
            TransferOutcome::Packets(packets) => packets.last(),
            _ => None,
        }
    }
}

/// Accumulation state for one direction of the bridge.
#[derive(Debug)]
pub struct TransferBuffer {
    /// Direction label for logging ("uart" or "net").
    name: &'static str,
    /// Pending bytes; never longer than [`MAX_PACKET_SIZE`].
    data: BytesMut,
    /// Tail of a frame the destination only took part of.
    unsent: BytesMut,
    stats: TransferStats,
    write_timeout: Duration,
}

impl TransferBuffer {
    /// Create an empty buffer labelled `name` for log output.
    pub fn new(name: &'static str) -> Self {
        TransferBuffer {
            name,
            data: BytesMut::with_capacity(MAX_PACKET_SIZE),
            unsent: BytesMut::new(),
            stats: TransferStats::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Set the write deadline of one forward call (default: 100ms).
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Direction label.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of bytes waiting for the rest of their packet.
    pub fn pending(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes of a partly written frame still owed to the
    /// destination.
    pub fn unsent(&self) -> usize {
        self.unsent.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Count a failed read from the source.
    pub fn record_read_error(&mut self) {
        self.stats.read_errors += 1;
    }

    /// Count a failed write made outside [`forward`](Self::forward).
    pub fn record_write_error(&mut self) {
        self.stats.write_errors += 1;
    }

    /// Drop any partially accumulated packet.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Forget the unfinished frame owed to the destination. Called when
    /// the destination is replaced.
    pub fn discard_unsent(&mut self) {
        if !self.unsent.is_empty() {
            debug!(direction = self.name, bytes = self.unsent.len(), "dropping unsent frame tail");
            self.unsent.clear();
        }
    }

    /// Feed bytes read from the source and forward complete packets.
    ///
    /// Returns the packets completed by `incoming`; the last of them is
    /// available through [`TransferOutcome::last_packet`]. An empty
    /// `incoming` slice means the source reported end-of-stream.
    ///
    /// Every complete packet is written to `dst`; when `dst` is `None` the
    /// packet is dropped without counting a write error. Write failures
    /// are counted and never abort the transfer, and the whole call spends
    /// at most one write timeout waiting on `dst`.
    pub async fn forward<W>(&mut self, incoming: &[u8], mut dst: Option<&mut W>) -> TransferOutcome
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if incoming.is_empty() {
            debug!(direction = self.name, "end of stream");
            return TransferOutcome::EndOfStream;
        }

        trace!(direction = self.name, bytes = incoming.len(), data = ?incoming, "received");

        let deadline = Instant::now() + self.write_timeout;
        let mut stalled = false;
        let mut decoded = Vec::new();
        let mut rest = incoming;

        while !rest.is_empty() {
            // The decode loop below always leaves fewer than MAX_PACKET_SIZE
            // bytes behind, so there is room for at least one more byte.
            let take = (MAX_PACKET_SIZE - self.data.len()).min(rest.len());
            self.data.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            loop {
                match packet::decode_packet(&self.data) {
                    DecodeResult::Packet(pkt, consumed) => {
                        self.data.advance(consumed);
                        self.stats.valid_packets += 1;
                        trace!(
                            direction = self.name,
                            kind = packet::packet_type_name(pkt.kind()),
                            len = consumed,
                            "packet decoded"
                        );
                        if let Some(w) = dst.as_deref_mut() {
                            if stalled {
                                self.stats.write_errors += 1;
                                trace!(direction = self.name, "destination stalled, packet dropped");
                            } else if let Err(error) = self.deliver(w, pkt.as_bytes(), deadline).await {
                                self.stats.write_errors += 1;
                                stalled = matches!(error, Error::Timeout);
                                warn!(
                                    direction = self.name,
                                    %error,
                                    unsent = self.unsent.len(),
                                    "packet write failed"
                                );
                            }
                        }
                        decoded.push(pkt);
                    }
                    DecodeResult::Garbage(consumed) => {
                        self.data.advance(consumed);
                        self.stats.invalid_packets += 1;
                        debug!(direction = self.name, bytes = consumed, "discarded garbage");
                    }
                    DecodeResult::Overflow(consumed) => {
                        self.data.advance(consumed);
                        self.stats.invalid_packets += 1;
                        warn!(
                            direction = self.name,
                            bytes = consumed,
                            "packet exceeded maximum size, discarded"
                        );
                    }
                    DecodeResult::Incomplete => break,
                }
            }
        }

        if decoded.is_empty() {
            TransferOutcome::Incomplete
        } else {
            TransferOutcome::Packets(decoded)
        }
    }

    /// Write a frame the bridge originates itself (a keepalive) to this
    /// direction's destination, within the write timeout.
    ///
    /// Any unfinished forwarded frame goes out first. Counters are left
    /// alone; the caller decides which direction a failure belongs to.
    pub async fn write_frame<W>(&mut self, dst: &mut W, frame: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let deadline = Instant::now() + self.write_timeout;
        self.deliver(dst, frame, deadline).await
    }

    /// Finish the unsent tail, then write `frame`, all before `deadline`.
    ///
    /// A frame cut short by the deadline leaves its remainder in `unsent`.
    async fn deliver<W>(&mut self, dst: &mut W, frame: &[u8], deadline: Instant) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if !self.unsent.is_empty() {
            let (written, result) = write_before(dst, &self.unsent, deadline).await;
            self.unsent.advance(written);
            if let Err(e) = result {
                if !matches!(e, Error::Timeout) {
                    self.unsent.clear();
                }
                return Err(e);
            }
        }

        let (written, result) = write_before(dst, frame, deadline).await;
        if let Err(e) = result {
            if matches!(e, Error::Timeout) && written > 0 && written < frame.len() {
                self.unsent.extend_from_slice(&frame[written..]);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Write as much of `bytes` as `dst` accepts before `deadline`, then flush.
///
/// Returns the number of bytes handed to `dst` next to the outcome.
async fn write_before<W>(dst: &mut W, bytes: &[u8], deadline: Instant) -> (usize, Result<()>)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < bytes.len() {
        match tokio::time::timeout_at(deadline, dst.write(&bytes[written..])).await {
            Ok(Ok(0)) => return (written, Err(Error::Io(io::ErrorKind::WriteZero.into()))),
            Ok(Ok(n)) => written += n,
            Ok(Err(e)) => return (written, Err(map_io_error(e))),
            Err(_) => return (written, Err(Error::Timeout)),
        }
    }

    let flushed = match tokio::time::timeout_at(deadline, dst.flush()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(map_io_error(e)),
        Err(_) => Err(Error::Timeout),
    };
    (written, flushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PKT_TYPE_EOS, PKT_TYPE_INIT2, PKT_TYPE_LCD, encode_packet};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Writer that fails every write.
    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Writer that never accepts a byte.
    struct StalledWriter;

    impl AsyncWrite for StalledWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Writer that takes `budget` bytes, then stops accepting.
    struct TrickleWriter {
        data: Vec<u8>,
        budget: usize,
    }

    impl TrickleWriter {
        fn new(budget: usize) -> Self {
            TrickleWriter { data: Vec::new(), budget }
        }
    }

    impl AsyncWrite for TrickleWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.budget == 0 {
                return Poll::Pending;
            }
            let n = self.budget.min(buf.len());
            self.budget -= n;
            self.data.extend_from_slice(&buf[..n]);
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
    async fn forwards_complete_packet() {
        let mut buf = TransferBuffer::new("uart");
        let mut out: Vec<u8> = Vec::new();
        let pkt = encode_packet(PKT_TYPE_INIT2, &[0x01]);

        let outcome = buf.forward(&pkt, Some(&mut out)).await;

        match outcome {
            TransferOutcome::Packets(p) => {
                assert_eq!(p.len(), 1);
                assert_eq!(p[0].kind(), PKT_TYPE_INIT2);
            }
            other => panic!("expected packet, got {other:?}"),
        }
        assert_eq!(out, pkt);
        assert_eq!(buf.stats().valid_packets, 1);
        assert_eq!(buf.pending(), 0);
    }

    #[tokio::test]
    async fn packet_split_across_reads() {
        let mut buf = TransferBuffer::new("net");
        let mut out: Vec<u8> = Vec::new();
        let pkt = encode_packet(PKT_TYPE_LCD, &[0x20, 0x21, 0x22]);

        let first = buf.forward(&pkt[..3], Some(&mut out)).await;
        assert_eq!(first, TransferOutcome::Incomplete);
        assert_eq!(buf.pending(), 3);
        assert!(out.is_empty());

        let second = buf.forward(&pkt[3..], Some(&mut out)).await;
        assert_eq!(second.last_packet().map(|p| p.kind()), Some(PKT_TYPE_LCD));
        assert_eq!(out, pkt);
    }

    #[tokio::test]
    async fn returns_every_packet_in_order() {
        let mut buf = TransferBuffer::new("uart");
        let mut out: Vec<u8> = Vec::new();
        let mut bytes = encode_packet(PKT_TYPE_INIT2, &[]);
        bytes.extend(encode_packet(PKT_TYPE_EOS, &[]));

        let outcome = buf.forward(&bytes, Some(&mut out)).await;

        let kinds: Vec<u8> = match &outcome {
            TransferOutcome::Packets(p) => p.iter().map(|p| p.kind()).collect(),
            other => panic!("expected packets, got {other:?}"),
        };
        assert_eq!(kinds, vec![PKT_TYPE_INIT2, PKT_TYPE_EOS]);
        assert_eq!(outcome.last_packet().map(|p| p.kind()), Some(PKT_TYPE_EOS));
        assert_eq!(out, bytes);
        assert_eq!(buf.stats().valid_packets, 2);
    }

    #[tokio::test]
    async fn garbage_is_counted_not_forwarded() {
        let mut buf = TransferBuffer::new("uart");
        let mut out: Vec<u8> = Vec::new();
        let mut bytes = vec![0x01, 0x02, 0x03];
        let pkt = encode_packet(PKT_TYPE_LCD, &[0x44]);
        bytes.extend(&pkt);

        let outcome = buf.forward(&bytes, Some(&mut out)).await;

        assert!(matches!(outcome, TransferOutcome::Packets(_)));
        assert_eq!(out, pkt);
        assert_eq!(buf.stats().invalid_packets, 1);
        assert_eq!(buf.stats().valid_packets, 1);
    }

    #[tokio::test]
    async fn oversized_packet_discarded() {
        let mut buf = TransferBuffer::new("net");
        let mut out: Vec<u8> = Vec::new();
        let mut bytes = vec![0xFE, PKT_TYPE_LCD];
        bytes.resize(MAX_PACKET_SIZE + 10, 0x20);

        let outcome = buf.forward(&bytes, Some(&mut out)).await;

        assert_eq!(outcome, TransferOutcome::Incomplete);
        assert!(out.is_empty());
        assert_eq!(buf.stats().invalid_packets, 2);
        assert!(buf.pending() < MAX_PACKET_SIZE);
    }

    #[tokio::test]
    async fn empty_read_is_end_of_stream() {
        let mut buf = TransferBuffer::new("net");
        let outcome = buf.forward::<Vec<u8>>(&[], None).await;
        assert_eq!(outcome, TransferOutcome::EndOfStream);
        assert_eq!(buf.stats(), TransferStats::default());
    }

    #[tokio::test]
    async fn no_destination_drops_silently() {
        let mut buf = TransferBuffer::new("uart");
        let pkt = encode_packet(PKT_TYPE_LCD, &[]);

        let outcome = buf.forward::<Vec<u8>>(&pkt, None).await;

        assert!(matches!(outcome, TransferOutcome::Packets(_)));
        assert_eq!(buf.stats().valid_packets, 1);
        assert_eq!(buf.stats().write_errors, 0);
    }

    #[tokio::test]
    async fn write_failure_counted_and_transfer_continues() {
        let mut buf = TransferBuffer::new("uart");
        let mut out = BrokenWriter;
        let mut bytes = encode_packet(PKT_TYPE_INIT2, &[]);
        bytes.extend(encode_packet(PKT_TYPE_LCD, &[]));

        let outcome = buf.forward(&bytes, Some(&mut out)).await;

        assert_eq!(outcome.last_packet().map(|p| p.kind()), Some(PKT_TYPE_LCD));
        assert_eq!(buf.stats().write_errors, 2);
        assert_eq!(buf.stats().valid_packets, 2);
    }

    #[tokio::test]
    async fn stalled_destination_times_out() {
        let mut buf = TransferBuffer::new("uart").with_write_timeout(Duration::from_millis(20));
        let mut out = StalledWriter;
        let pkt = encode_packet(PKT_TYPE_LCD, &[]);

        let outcome = buf.forward(&pkt, Some(&mut out)).await;

        assert!(matches!(outcome, TransferOutcome::Packets(_)));
        assert_eq!(buf.stats().write_errors, 1);
    }

    #[tokio::test]
    async fn stalled_destination_shares_one_deadline() {
        let mut buf = TransferBuffer::new("uart").with_write_timeout(Duration::from_millis(40));
        let mut out = StalledWriter;
        let mut burst = Vec::new();
        for _ in 0..6 {
            burst.extend_from_slice(&encode_packet(PKT_TYPE_LCD, b"1"));
        }

        let started = Instant::now();
        let outcome = buf.forward(&burst, Some(&mut out)).await;

        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(outcome.last_packet().map(Packet::kind), Some(PKT_TYPE_LCD));
        assert_eq!(buf.stats().valid_packets, 6);
        assert_eq!(buf.stats().write_errors, 6);
    }

    #[tokio::test]
    async fn cut_frame_is_finished_before_the_next() {
        let mut buf = TransferBuffer::new("uart").with_write_timeout(Duration::from_millis(20));
        let mut out = TrickleWriter::new(2);
        let first = encode_packet(PKT_TYPE_LCD, b"A");
        let second = encode_packet(PKT_TYPE_LCD, b"B");
        let third = encode_packet(PKT_TYPE_INIT2, &[]);

        let mut burst = first.clone();
        burst.extend_from_slice(&second);
        buf.forward(&burst, Some(&mut out)).await;
        assert_eq!(buf.unsent(), first.len() - 2);
        assert_eq!(buf.stats().write_errors, 2);

        out.budget = usize::MAX;
        buf.forward(&third, Some(&mut out)).await;

        let mut expected = first.clone();
        expected.extend_from_slice(&third);
        assert_eq!(out.data, expected);
        assert_eq!(buf.unsent(), 0);
        assert_eq!(buf.stats().write_errors, 2);
    }

    #[tokio::test]
    async fn discarded_tail_is_not_written() {
        let mut buf = TransferBuffer::new("uart").with_write_timeout(Duration::from_millis(20));
        let mut out = TrickleWriter::new(1);
        let first = encode_packet(PKT_TYPE_LCD, b"A");
        let second = encode_packet(PKT_TYPE_EOS, &[]);

        buf.forward(&first, Some(&mut out)).await;
        assert!(buf.unsent() > 0);

        buf.discard_unsent();
        let mut fresh = TrickleWriter::new(usize::MAX);
        buf.forward(&second, Some(&mut fresh)).await;

        assert_eq!(fresh.data, second);
    }

    #[tokio::test]
    async fn write_frame_reports_without_counting() {
        let mut buf = TransferBuffer::new("net").with_write_timeout(Duration::from_millis(20));
        let frame = packet::keepalive_packet();

        let mut out: Vec<u8> = Vec::new();
        buf.write_frame(&mut out, &frame).await.unwrap();
        assert_eq!(out, frame);

        let err = buf.write_frame(&mut BrokenWriter, &frame).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost));
        let err = buf.write_frame(&mut StalledWriter, &frame).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(buf.stats().write_errors, 0);

        buf.record_write_error();
        assert_eq!(buf.stats().write_errors, 1);
    }

    #[test]
    fn clear_drops_partial_packet() {
        let mut buf = TransferBuffer::new("net");
        buf.data.extend_from_slice(&[0xFE, 0x06]);
        assert_eq!(buf.pending(), 2);
        buf.clear();
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn stats_display() {
        let stats = TransferStats {
            valid_packets: 3,
            invalid_packets: 1,
            write_errors: 2,
            read_errors: 0,
        };
        assert_eq!(
            stats.to_string(),
            "valid=3 invalid=1 write_errors=2 read_errors=0"
        );
    }
}
