// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::io::MultiLineWriter;
use crate::sinks::MetricSink;
use std::io::{self, Write};
use std::str;

/// Default maximum size, in bytes, of the payload handed to the sink in a
/// single call by a batching session. This is the "safest" size for a UDP
/// packet according to the Etsy Statsd docs. Networks with larger MTUs can
/// raise it via `StatsdClientBuilder::with_max_packet_size` or
/// `MetricPipeline::with_capacity`.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// Scoped batching session that coalesces formatted metric lines into
/// fewer sink calls.
///
/// Lines queued on a pipeline are joined with newlines and handed to the
/// underlying `MetricSink` as one payload whenever the configured capacity
/// would be exceeded, when `flush` is called, and when the session goes out
/// of scope. The drop flush runs on every exit path, including unwinding,
/// so a pipeline never strands buffered metrics.
///
/// A pipeline does not change what is sent, only how many network calls it
/// takes to send it. It is used internally to emit the reset-then-set pair
/// for negative absolute gauge values as a single unit and is available to
/// callers who want to batch a burst of metrics by hand:
///
/// ```
/// use tagsd::{MetricPipeline, NopMetricSink};
///
/// let sink = NopMetricSink;
/// let mut pipeline = MetricPipeline::new(&sink);
/// pipeline.emit("requests.handled:1|c").unwrap();
/// pipeline.emit("requests.inflight:7|g").unwrap();
/// // both lines leave in a single payload when the pipeline is dropped
/// ```
pub struct MetricPipeline<'a> {
    writer: MultiLineWriter<SinkWriter<'a>>,
}

impl<'a> MetricPipeline<'a> {
    /// Create a new session over the given sink with the default maximum
    /// payload size.
    pub fn new(sink: &'a (dyn MetricSink + 'a)) -> MetricPipeline<'a> {
        Self::with_capacity(sink, DEFAULT_MAX_PACKET_SIZE)
    }

    /// Create a new session over the given sink, with payloads bounded by
    /// `cap` bytes. A single line longer than `cap` is passed through to
    /// the sink on its own rather than truncated.
    pub fn with_capacity(sink: &'a (dyn MetricSink + 'a), cap: usize) -> MetricPipeline<'a> {
        MetricPipeline {
            writer: MultiLineWriter::new(SinkWriter { sink }, cap),
        }
    }

    /// Queue a fully formatted metric line for sending.
    pub fn emit(&mut self, metric: &str) -> io::Result<usize> {
        self.writer.write(metric.as_bytes())
    }

    /// Send everything currently buffered, even if the session is not full.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for MetricPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricPipeline").finish_non_exhaustive()
    }
}

/// Adapter routing buffered payloads to a `MetricSink` via the `Write` trait
struct SinkWriter<'a> {
    sink: &'a (dyn MetricSink + 'a),
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let payload = str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.sink.emit(payload)?;
        // A successful emit consumed the whole payload even when it reports
        // fewer bytes (buffering or discarding sinks), which would read as
        // `WriteZero` to the buffered writer above us.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
