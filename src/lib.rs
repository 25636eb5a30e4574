// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A noiseless, tag-extended Statsd client for Rust!
//!
//! Tagsd emits counters, timers, gauges, and sets to a Statsd server in
//! the tag-extended wire format understood by Telegraf, InfluxDB, and
//! Datadog style collectors, and it does so without ever letting metrics
//! emission fail or stall the application being instrumented.
//!
//! ## Features
//!
//! * Counters, timers, gauges (absolute and relative), and sets over UDP.
//! * Telegraf style tags (`stat,key=value,bare:1|c`): default tags bound
//!   to the client, per-call tags that override them by key.
//! * Client side sampling with `|@rate` annotation.
//! * A "noiseless" UDP transport: the socket is created lazily on first
//!   use and every transport fault is consumed at the sink boundary
//!   instead of being returned to the caller.
//! * Batching sessions that coalesce several metrics into one packet.
//! * Support for alternate backends via the `MetricSink` trait.
//!
//! ## Usage
//!
//! ### Simple Use
//!
//! In most applications a single constructor call is all the setup there
//! is. Nothing here touches the network until the first metric is
//! emitted, and no call below can fail because of the network:
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::StatsdClient;
//!
//! let client = StatsdClient::from_udp_host("my.metrics", "metrics.example.com");
//!
//! client.incr("some.counter");
//! client.time("some.method_call", 42.0);
//! client.gauge("some.thing", 7);
//! client.set("users.uniques", 42);
//! ```
//!
//! ### Configuring the transport
//!
//! The port, address family, and the handler invoked when a metric is
//! dropped due to a transport fault can be customized on the sink. The
//! default fault handler forwards to the [`log`](https://docs.rs/log)
//! facade at `WARN` level, which is itself silent unless the application
//! installs a logger:
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::{NoiselessUdpMetricSink, StatsdClient};
//!
//! let sink = NoiselessUdpMetricSink::builder("metrics.example.com")
//!     .port(8111)
//!     .ipv6(false)
//!     .with_fault_handler(|err| eprintln!("metric dropped: {}", err))
//!     .build();
//! let client = StatsdClient::from_sink("my.metrics", sink);
//!
//! client.incr("some.event");
//! ```
//!
//! ### Use With Tags
//!
//! Tags are an extension to the Statsd protocol and so may not be
//! supported by all servers. Default tags are attached to every metric a
//! client emits; tags added per call override a default with the same key
//! for that call only:
//!
//! ```rust
//! use tagsd::prelude::*;
//! use tagsd::{Metric, StatsdClient, NopMetricSink};
//!
//! let client = StatsdClient::builder("my.prefix", NopMetricSink)
//!     .with_tag("stage", "prod")
//!     .build();
//!
//! let res = client.count_with_tags("my.counter", 29)
//!     .with_tag("host", "web03.example.com")
//!     .with_tag_key("beta-test")
//!     .try_send();
//!
//! assert_eq!(
//!     concat!(
//!         "my.prefix.my.counter,",
//!         "stage=prod,",
//!         "host=web03.example.com,",
//!         "beta-test:29|c"
//!     ),
//!     res.unwrap().as_metric_str()
//! );
//! ```
//!
//! ### Sampling
//!
//! High frequency events can be sampled down on the client. Each call
//! makes a single random draw against the rate; rejected calls send
//! nothing at all and still return success. Lines that are sent carry the
//! rate so the server can scale counts back up:
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::StatsdClient;
//!
//! let client = StatsdClient::from_udp_host("my.metrics", "localhost");
//!
//! // roughly one in ten calls puts "my.metrics.requests:1|c|@0.1"
//! // on the wire
//! client.incr_with_tags("requests").with_sample_rate(0.1).send();
//! ```
//!
//! ### Timing a scope
//!
//! The timer helper measures the interval between its creation and the
//! point where it is stopped or dropped, then emits the elapsed
//! milliseconds through the normal timing path:
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::StatsdClient;
//!
//! let client = StatsdClient::from_udp_host("my.metrics", "localhost");
//!
//! let timer = client.timer("requests.handle");
//! // ... do the work being measured ...
//! timer.stop();
//! ```
//!
//! ### Batching
//!
//! Sending a metric over UDP is fast but not free. A pipeline session
//! coalesces several metrics into fewer packets, bounded by the client's
//! maximum packet size, and flushes whatever it holds when it goes out of
//! scope no matter how the scope exits:
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::{Metric, StatsdClient};
//!
//! let client = StatsdClient::from_udp_host("my.metrics", "localhost");
//!
//! let a = client.incr_with_tags("batch.first").try_send().unwrap();
//! let b = client.incr_with_tags("batch.second").try_send().unwrap();
//!
//! let mut pipeline = client.pipeline();
//! pipeline.emit(a.as_metric_str());
//! pipeline.emit(b.as_metric_str());
//! // both counters leave in a single packet here
//! ```
//!
//! ### Implemented Traits
//!
//! Each of the methods that the `StatsdClient` uses to send metrics are
//! implemented as a trait. There is also a trait that combines all of
//! these other traits, `MetricClient`. If we want, we can just use one of
//! the trait types to refer to the client instance. This might be useful
//! to you if you'd like to swap out the actual client with a dummy version
//! (backed by a `NopMetricSink`) when you are unit testing your code or
//! want to abstract away all the implementation details of the client
//! being used behind a trait and pointer.
//!
//! ```rust,no_run
//! use tagsd::prelude::*;
//! use tagsd::StatsdClient;
//!
//! pub struct MyUserDao {
//!     metrics: Box<dyn MetricClient>,
//! }
//!
//! impl MyUserDao {
//!     pub fn new<T: MetricClient + 'static>(metrics: T) -> MyUserDao {
//!         MyUserDao { metrics: Box::new(metrics) }
//!     }
//!
//!     pub fn get_user_by_id(&self, id: u64) -> Option<u64> {
//!         self.metrics.incr("get_user_by_id");
//!         None
//!     }
//! }
//!
//! let metrics = StatsdClient::from_udp_host("counter.example", "localhost");
//! let dao = MyUserDao::new(metrics);
//! dao.get_user_by_id(123);
//! ```
//!
//! ### Custom Metric Sinks
//!
//! The `StatsdClient` uses implementations of the `MetricSink` trait to
//! send metrics to a metric server. Maybe you want to do something not
//! covered by an existing sink. An example of creating a custom sink is
//! below.
//!
//! ```rust,no_run
//! use std::io;
//! use tagsd::prelude::*;
//! use tagsd::{StatsdClient, MetricSink};
//!
//! pub struct MyMetricSink;
//!
//! impl MetricSink for MyMetricSink {
//!     fn emit(&self, metric: &str) -> io::Result<usize> {
//!         // Your custom metric sink implementation goes here!
//!         Ok(0)
//!     }
//! }
//!
//! let sink = MyMetricSink;
//! let client = StatsdClient::from_sink("my.prefix", sink);
//!
//! client.count("my.counter.thing", 42);
//! client.time("my.method.time", 25.0);
//! ```

#![forbid(unsafe_code)]

/// Default port of a Statsd server
pub const DEFAULT_PORT: u16 = 8125;

pub use self::builder::MetricBuilder;

pub use self::client::{
    Counted, CountedExt, Gauged, MetricClient, Setted, StatsdClient, StatsdClientBuilder, Timed,
};

pub use self::pipeline::{MetricPipeline, DEFAULT_MAX_PACKET_SIZE};

pub use self::sinks::{
    MetricSink, NoiselessUdpMetricSink, NoiselessUdpMetricSinkBuilder, NopMetricSink, SinkStats, SpyMetricSink,
};

pub use self::timer::MetricTimer;

pub use self::types::{Counter, ErrorKind, Gauge, Metric, MetricError, MetricResult, Set, Timer};

mod builder;
mod client;
pub mod ext;
mod io;
mod pipeline;
pub mod prelude;
mod sinks;
mod timer;
mod types;

mod sealed {
    pub trait Sealed {}
}
