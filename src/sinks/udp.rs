// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::sinks::core::{MetricSink, SinkStats, SocketStats};
use crate::types::{ErrorKind, MetricError, MetricResult};
use crate::DEFAULT_PORT;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::panic::RefUnwindSafe;
use std::sync::Mutex;

/// Lifecycle of the outbound socket.
///
/// The sink starts out `Uninitialized` and only attempts to resolve the
/// target and open a socket when the first metric is emitted. A failed
/// attempt leaves the state `Uninitialized` so the next emit tries again;
/// a successful one caches the socket and resolved address for the life
/// of the sink.
#[derive(Debug)]
enum SocketState {
    Uninitialized,
    Ready { socket: UdpSocket, addr: SocketAddr },
}

/// Implementation of a `MetricSink` that emits metrics over UDP and never
/// surfaces a transport fault to the caller.
///
/// Construction is infallible and performs no network operations: the
/// hostname is resolved and the socket opened lazily on the first call to
/// `emit`, then cached and reused. Resolution failures, socket creation
/// failures, and send failures are all consumed at this boundary, handed
/// to an injected fault handler for operator visibility, and the emitting
/// call returns normally. Metrics delivery is best effort: instrumentation
/// must never crash or stall the application it measures.
///
/// The default fault handler forwards to the `log` crate at `WARN` level,
/// which is itself a no-op unless the host application installs a logger.
///
/// # Example
///
/// ```
/// use tagsd::NoiselessUdpMetricSink;
///
/// let sink = NoiselessUdpMetricSink::new("metrics.example.com");
/// // nothing has been resolved or opened yet, and even if the host never
/// // resolves, emitting through this sink will not return an error
/// ```
pub struct NoiselessUdpMetricSink {
    host: String,
    port: u16,
    ipv6: bool,
    faults: Box<dyn Fn(MetricError) + Sync + Send + RefUnwindSafe>,
    state: Mutex<SocketState>,
    stats: SocketStats,
}

impl NoiselessUdpMetricSink {
    /// Construct a sink for the given host using the default Statsd port,
    /// IPv4, and the default (`log`-backed) fault handler.
    pub fn new(host: impl Into<String>) -> NoiselessUdpMetricSink {
        Self::builder(host).build()
    }

    /// Create a builder to customize the port, address family, or fault
    /// handler.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::NoiselessUdpMetricSink;
    ///
    /// let sink = NoiselessUdpMetricSink::builder("metrics.example.com")
    ///     .port(8111)
    ///     .ipv6(true)
    ///     .with_fault_handler(|err| eprintln!("metric dropped: {}", err))
    ///     .build();
    /// ```
    pub fn builder(host: impl Into<String>) -> NoiselessUdpMetricSinkBuilder {
        NoiselessUdpMetricSinkBuilder::new(host.into())
    }

    /// Resolve the target and open an unbound local datagram socket for
    /// the configured address family.
    fn open(host: &str, port: u16, ipv6: bool) -> MetricResult<(UdpSocket, SocketAddr)> {
        let addr = (host, port)
            .to_socket_addrs()?
            .find(|addr| if ipv6 { addr.is_ipv6() } else { addr.is_ipv4() })
            .ok_or_else(|| {
                MetricError::from((ErrorKind::InvalidInput, "no address of the requested family"))
            })?;

        let socket = if ipv6 {
            UdpSocket::bind("[::]:0")?
        } else {
            UdpSocket::bind("0.0.0.0:0")?
        };

        Ok((socket, addr))
    }

    fn try_send(&self, metric: &str) -> MetricResult<usize> {
        // Recover from a poisoned lock instead of panicking: worst case
        // the state is still Uninitialized and we resolve again.
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let SocketState::Uninitialized = *state {
            let (socket, addr) = Self::open(&self.host, self.port, self.ipv6)?;
            *state = SocketState::Ready { socket, addr };
        }

        match *state {
            SocketState::Ready { ref socket, addr } => {
                Ok(self.stats.update(socket.send_to(metric.as_bytes(), addr), metric.len())?)
            }
            SocketState::Uninitialized => unreachable!("socket state initialized above"),
        }
    }
}

impl MetricSink for NoiselessUdpMetricSink {
    /// Send the metric, reporting every byte as consumed whether or not it
    /// made it onto the wire. A fault is only observable through the fault
    /// handler and the drop counters in `stats()`.
    fn emit(&self, metric: &str) -> io::Result<usize> {
        match self.try_send(metric) {
            Ok(written) => Ok(written),
            Err(err) => {
                self.stats.incr_dropped(metric.len());
                (self.faults)(err);
                Ok(metric.len())
            }
        }
    }

    fn stats(&self) -> SinkStats {
        (&self.stats).into()
    }
}

impl fmt::Debug for NoiselessUdpMetricSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiselessUdpMetricSink")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ipv6", &self.ipv6)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Builder for creating and customizing `NoiselessUdpMetricSink` instances.
#[must_use]
pub struct NoiselessUdpMetricSinkBuilder {
    host: String,
    port: u16,
    ipv6: bool,
    faults: Box<dyn Fn(MetricError) + Sync + Send + RefUnwindSafe>,
}

impl NoiselessUdpMetricSinkBuilder {
    fn new(host: String) -> Self {
        NoiselessUdpMetricSinkBuilder {
            host,
            port: DEFAULT_PORT,
            ipv6: false,
            faults: Box::new(log_fault_handler),
        }
    }

    /// Target port of the metric server, `8125` unless set.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Resolve the host to an IPv6 address and send over an IPv6 socket.
    /// When unset only IPv4 addresses of the host are considered.
    pub fn ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// Set the handler invoked whenever a metric is dropped due to a
    /// transport fault (failed resolution, socket creation, or send).
    ///
    /// The handler is the only way such faults are observable; the calls
    /// emitting metrics always return normally. The handler should consume
    /// the fault without panicking.
    pub fn with_fault_handler<F>(mut self, faults: F) -> Self
    where
        F: Fn(MetricError) + Sync + Send + RefUnwindSafe + 'static,
    {
        self.faults = Box::new(faults);
        self
    }

    /// Construct the sink. No network activity happens until the first
    /// metric is emitted.
    pub fn build(self) -> NoiselessUdpMetricSink {
        NoiselessUdpMetricSink {
            host: self.host,
            port: self.port,
            ipv6: self.ipv6,
            faults: self.faults,
            state: Mutex::new(SocketState::Uninitialized),
            stats: SocketStats::default(),
        }
    }
}

fn log_fault_handler(err: MetricError) {
    log::warn!("metric dropped due to transport fault: {}", err);
}

#[cfg(test)]
mod tests {
    use super::{NoiselessUdpMetricSink, SocketState};
    use crate::sinks::MetricSink;
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn local_receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[test]
    fn test_construction_does_not_touch_the_network() {
        let sink = NoiselessUdpMetricSink::new("this-host-does-not-exist.invalid");
        let state = sink.state.lock().unwrap();
        assert!(matches!(*state, SocketState::Uninitialized));
    }

    #[test]
    fn test_emit_delivers_datagram() {
        let (receiver, port) = local_receiver();
        let sink = NoiselessUdpMetricSink::builder("127.0.0.1").port(port).build();

        assert_eq!(7, sink.emit("buz:1|c").unwrap());

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(b"buz:1|c", &buf[..len]);
    }

    #[test]
    fn test_emit_reuses_cached_socket() {
        let (receiver, port) = local_receiver();
        let sink = NoiselessUdpMetricSink::builder("127.0.0.1").port(port).build();

        sink.emit("foo:1|c").unwrap();
        sink.emit("foo:2|c").unwrap();

        let mut buf = [0u8; 64];
        let (len, first_from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(b"foo:1|c", &buf[..len]);
        let (len, second_from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(b"foo:2|c", &buf[..len]);

        // same local socket for both sends
        assert_eq!(first_from, second_from);
        assert_eq!(2, sink.stats().packets_sent);
    }

    #[test]
    fn test_unresolvable_host_is_consumed_and_counted() {
        let faults = Arc::new(AtomicUsize::new(0));
        let faults_ref = Arc::clone(&faults);

        let sink = NoiselessUdpMetricSink::builder("this-host-does-not-exist.invalid")
            .with_fault_handler(move |_err| {
                faults_ref.fetch_add(1, Ordering::Release);
            })
            .build();

        // both calls return Ok with the bytes reported as consumed, both
        // faults reach the handler
        assert_eq!(7, sink.emit("foo:1|c").unwrap());
        assert_eq!(7, sink.emit("foo:2|c").unwrap());

        assert_eq!(2, faults.load(Ordering::Acquire));
        assert_eq!(2, sink.stats().packets_dropped);
    }

    #[test]
    fn test_family_mismatch_is_consumed() {
        let faults = Arc::new(AtomicUsize::new(0));
        let faults_ref = Arc::clone(&faults);

        // 127.0.0.1 can never satisfy a request for an IPv6 address
        let sink = NoiselessUdpMetricSink::builder("127.0.0.1")
            .ipv6(true)
            .with_fault_handler(move |_err| {
                faults_ref.fetch_add(1, Ordering::Release);
            })
            .build();

        assert_eq!(7, sink.emit("foo:1|c").unwrap());
        assert_eq!(1, faults.load(Ordering::Acquire));
    }
}
