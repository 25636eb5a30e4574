// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::pipeline::MetricPipeline;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the I/O counters of a sink.
#[derive(Clone, Debug, Default)]
pub struct SinkStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

/// Shared atomic counters for sinks backed by a socket.
#[derive(Debug, Clone, Default)]
pub(crate) struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    /// Record the outcome of a single socket write, passing the result
    /// through unchanged.
    pub fn update(&self, res: io::Result<usize>, len: usize) -> io::Result<usize> {
        match res {
            Ok(written) => {
                self.bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(written)
            }
            Err(e) => {
                self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Record a payload dropped before it ever reached a socket, such as
    /// when the socket could not be created in the first place.
    pub fn incr_dropped(&self, len: usize) {
        self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl From<&SocketStats> for SinkStats {
    fn from(stats: &SocketStats) -> Self {
        SinkStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Trait for various backends that send tagged Statsd metrics somewhere.
///
/// The metric string will be in the canonical tag-extended form to be sent
/// to a Statsd server, without a trailing newline. Examples of each
/// supported metric type are given below.
///
/// ## Counter
///
/// ``` text
/// some.counter,host=web01:123|c
/// ```
///
/// ## Timer
///
/// ``` text
/// some.timer:456.000000|ms
/// ```
///
/// ## Gauge
///
/// ``` text
/// some.gauge:5|g
/// ```
///
/// ## Set
///
/// ``` text
/// some.set:2|s
/// ```
///
/// A payload produced by a batching session may contain several such lines
/// joined by newlines.
pub trait MetricSink {
    /// Send the rendered metric using this sink and return the number of
    /// bytes written or an I/O error.
    ///
    /// Note that implementations may return `0` bytes if the metric is not
    /// immediately written (such as when it is buffered), and a sink that
    /// consumes transport faults instead of surfacing them reports the
    /// bytes as consumed either way. Callers should *NOT* interpret the
    /// count as a delivery receipt.
    fn emit(&self, metric: &str) -> io::Result<usize>;

    /// Flush any currently buffered metrics to the underlying backend,
    /// returning an I/O error if they could not be written for some reason.
    ///
    /// Note that not all sinks buffer metrics and so the default
    /// implementation of this method does nothing.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Return I/O telemetry like bytes / packets sent or dropped.
    ///
    /// Note that not all sinks implement this method and the default
    /// implementation returns zeros.
    fn stats(&self) -> SinkStats {
        SinkStats::default()
    }

    /// Start a batching session over this sink with the default maximum
    /// payload size.
    ///
    /// Lines queued on the session are coalesced and handed to `emit` in
    /// fewer, larger payloads. See `MetricPipeline`.
    fn pipeline(&self) -> MetricPipeline<'_>
    where
        Self: Sized,
    {
        MetricPipeline::new(self)
    }
}

/// Implementation of a `MetricSink` that discards all metrics.
///
/// Useful for disabling metric collection or unit tests.
#[derive(Debug, Clone)]
pub struct NopMetricSink;

impl MetricSink for NopMetricSink {
    fn emit(&self, _metric: &str) -> io::Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricSink, NopMetricSink, SocketStats};
    use std::io;

    #[test]
    fn test_nop_metric_sink() {
        let sink = NopMetricSink;
        assert_eq!(0, sink.emit("baz:4|c").unwrap());
        assert_eq!(0, sink.stats().packets_sent);
    }

    #[test]
    fn test_nop_metric_sink_pipeline() {
        let sink = NopMetricSink;
        let mut pipeline = sink.pipeline();
        assert_eq!(7, pipeline.emit("baz:4|c").unwrap());
        assert!(pipeline.flush().is_ok());
    }

    #[test]
    fn test_socket_stats_counts_sends_and_drops() {
        let stats = SocketStats::default();

        assert!(stats.update(Ok(8), 8).is_ok());
        assert!(stats.update(Err(io::Error::from(io::ErrorKind::WouldBlock)), 6).is_err());
        stats.incr_dropped(4);

        let snapshot = crate::sinks::SinkStats::from(&stats);
        assert_eq!(8, snapshot.bytes_sent);
        assert_eq!(1, snapshot.packets_sent);
        assert_eq!(10, snapshot.bytes_dropped);
        assert_eq!(2, snapshot.packets_dropped);
    }
}
