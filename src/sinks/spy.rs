// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::sinks::core::MetricSink;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::io::{self, ErrorKind};

/// `MetricSink` implementation that writes all payloads to the `Sender`
/// half of a channel while callers are given ownership of the `Receiver`
/// half.
///
/// This is not a general purpose sink, rather it's a sink meant for
/// verifying metrics written during the course of tests: each received
/// `Vec<u8>` is exactly one payload as a server would have seen it, either
/// a single metric line or a newline-joined batch from a pipeline. By
/// default the channel used is unbounded; the channel size can be limited
/// with the `with_capacity` method.
///
/// # Example
///
/// ```
/// use tagsd::prelude::*;
/// use tagsd::{SpyMetricSink, StatsdClient};
///
/// let (rx, sink) = SpyMetricSink::new();
/// let client = StatsdClient::from_sink("test", sink);
///
/// client.incr("some.counter").unwrap();
/// assert_eq!(b"test.some.counter:1|c".to_vec(), rx.recv().unwrap());
/// ```
#[derive(Debug)]
pub struct SpyMetricSink {
    sender: Sender<Vec<u8>>,
}

impl SpyMetricSink {
    pub fn new() -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(None)
    }

    pub fn with_capacity(queue: usize) -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(Some(queue))
    }

    fn with_queue_capacity(queue: Option<usize>) -> (Receiver<Vec<u8>>, Self) {
        let (tx, rx) = match queue {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };

        (rx, SpyMetricSink { sender: tx })
    }
}

impl MetricSink for SpyMetricSink {
    fn emit(&self, metric: &str) -> io::Result<usize> {
        match self.sender.try_send(metric.as_bytes().to_vec()) {
            Ok(_) => Ok(metric.len()),
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(ErrorKind::Other, "channel disconnected")),
            Err(TrySendError::Full(_)) => Err(io::Error::new(ErrorKind::Other, "channel full")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SpyMetricSink;
    use crate::sinks::MetricSink;

    #[test]
    fn test_spy_metric_sink() {
        let (rx, sink) = SpyMetricSink::new();
        sink.emit("foo:4|c").unwrap();

        assert_eq!(b"foo:4|c".to_vec(), rx.recv().unwrap());
    }

    #[test]
    fn test_spy_metric_sink_full() {
        let (rx, sink) = SpyMetricSink::with_capacity(1);
        sink.emit("foo:4|c").unwrap();

        assert!(sink.emit("foo:5|c").is_err());
        assert_eq!(1, rx.len());
    }

    #[test]
    fn test_spy_metric_sink_disconnected() {
        let (rx, sink) = SpyMetricSink::new();
        drop(rx);

        assert!(sink.emit("foo:4|c").is_err());
    }
}
