// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::{MetricBuilder, MetricFormatter, MetricValue};
use crate::pipeline::{MetricPipeline, DEFAULT_MAX_PACKET_SIZE};
use crate::sealed::Sealed;
use crate::sinks::{MetricSink, NoiselessUdpMetricSink};
use crate::timer::MetricTimer;
use crate::types::{Counter, Gauge, Metric, MetricError, MetricResult, Set, Timer};
use std::fmt;
use std::panic::RefUnwindSafe;
use std::time::Duration;

/// Conversion trait for valid values for counters
///
/// This trait must be implemented for any types that are used as counter
/// values (currently only `i64`). This trait is internal to how values are
/// formatted as part of metrics but is exposed publicly for documentation
/// purposes.
///
/// Typical use of this crate shouldn't require interacting with this trait.
pub trait ToCounterValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToCounterValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Signed(self))
    }
}

/// Conversion trait for valid values for timers
///
/// This trait must be implemented for any types that are used as timer
/// values (currently `f64`, `u64`, and `Duration`). Timer values are
/// rendered as milliseconds with six digit fixed-point precision no matter
/// the input type or magnitude. This trait is internal to how values are
/// formatted as part of metrics but is exposed publicly for documentation
/// purposes.
///
/// Typical use of this crate shouldn't require interacting with this trait.
pub trait ToTimerValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToTimerValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Millis(self))
    }
}

impl ToTimerValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Millis(self as f64))
    }
}

impl ToTimerValue for Duration {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Millis(self.as_secs_f64() * 1_000.0))
    }
}

/// Conversion trait for valid values for gauges
///
/// This trait must be implemented for any types that are used as gauge
/// values (currently `i64` and `f64`, signed types since gauges can be
/// set to or adjusted by negative values). This trait is internal to how
/// values are formatted as part of metrics but is exposed publicly for
/// documentation purposes.
///
/// Typical use of this crate shouldn't require interacting with this trait.
pub trait ToGaugeValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToGaugeValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Signed(self))
    }
}

impl ToGaugeValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Float(self))
    }
}

/// Conversion trait for valid values for sets
///
/// This trait must be implemented for any types that are used as set
/// values (currently only `i64`). This trait is internal to how values are
/// formatted as part of metrics but is exposed publicly for documentation
/// purposes.
///
/// Typical use of this crate shouldn't require interacting with this trait.
pub trait ToSetValue {
    fn try_to_value(self) -> MetricResult<MetricValue>;
}

impl ToSetValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue> {
        Ok(MetricValue::Signed(self))
    }
}

/// Trait for incrementing and decrementing counters.
///
/// Counters are simple values incremented or decremented by a client. The
/// rates at which these events occur or average values will be determined
/// by the server receiving them. Examples of counter uses include number
/// of logins to a system or requests received.
///
/// The following types are valid for counters:
/// * `i64`
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
///
/// Note that tags are a Telegraf/InfluxDB/Datadog extension to Statsd and
/// may not be supported by all servers.
pub trait Counted<T>
where
    T: ToCounterValue,
{
    /// Increment or decrement the counter by the given amount
    fn count(&self, key: &str, count: T) -> MetricResult<Counter> {
        self.count_with_tags(key, count).try_send()
    }

    /// Increment or decrement the counter by the given amount and return
    /// a `MetricBuilder` that can be used to add tags to the metric.
    fn count_with_tags<'a>(&'a self, key: &'a str, count: T) -> MetricBuilder<'_, '_, Counter>;
}

/// Trait for convenience methods for counters
///
/// This trait implements the usual increment and decrement operations on
/// top of [`Counted`]. A decrement by `n` negates the count before it
/// reaches the counter path, so `decr_by(key, 2)` puts `-2|c` on the wire.
pub trait CountedExt: Counted<i64> {
    /// Increment the counter by 1
    fn incr(&self, key: &str) -> MetricResult<Counter> {
        self.incr_with_tags(key).try_send()
    }

    /// Increment the counter by 1 and return a `MetricBuilder` that can
    /// be used to add tags to the metric.
    fn incr_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'_, '_, Counter> {
        self.count_with_tags(key, 1)
    }

    /// Increment the counter by the given amount
    fn incr_by(&self, key: &str, count: i64) -> MetricResult<Counter> {
        self.incr_by_with_tags(key, count).try_send()
    }

    /// Increment the counter by the given amount and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn incr_by_with_tags<'a>(&'a self, key: &'a str, count: i64) -> MetricBuilder<'_, '_, Counter> {
        self.count_with_tags(key, count)
    }

    /// Decrement the counter by 1
    fn decr(&self, key: &str) -> MetricResult<Counter> {
        self.decr_with_tags(key).try_send()
    }

    /// Decrement the counter by 1 and return a `MetricBuilder` that can
    /// be used to add tags to the metric.
    fn decr_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'_, '_, Counter> {
        self.count_with_tags(key, -1)
    }

    /// Decrement the counter by the given amount
    fn decr_by(&self, key: &str, count: i64) -> MetricResult<Counter> {
        self.decr_by_with_tags(key, count).try_send()
    }

    /// Decrement the counter by the given amount and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn decr_by_with_tags<'a>(&'a self, key: &'a str, count: i64) -> MetricBuilder<'_, '_, Counter> {
        self.count_with_tags(key, -count)
    }
}

/// Trait for recording timings in milliseconds.
///
/// Timings are a positive number of milliseconds between a start and end
/// time. Examples include time taken to render a web page or time taken
/// for a database call to return. Values are rendered with six digit
/// fixed-point precision; `Duration` values are converted to fractional
/// milliseconds.
///
/// The following types are valid for timers:
/// * `f64`
/// * `u64`
/// * `Duration`
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
///
/// Note that tags are a Telegraf/InfluxDB/Datadog extension to Statsd and
/// may not be supported by all servers.
pub trait Timed<T>
where
    T: ToTimerValue,
{
    /// Record a timing in milliseconds with the given key
    fn time(&self, key: &str, time: T) -> MetricResult<Timer> {
        self.time_with_tags(key, time).try_send()
    }

    /// Record a timing in milliseconds with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn time_with_tags<'a>(&'a self, key: &'a str, time: T) -> MetricBuilder<'_, '_, Timer>;
}

/// Trait for recording gauge values.
///
/// Gauge values are an instantaneous measurement of a value determined
/// by the client. They do not change unless changed by the client. Examples
/// include things like load average or how many connections are active.
///
/// Gauges can be set to an absolute value or adjusted relative to their
/// current value on the server with the `gauge_delta` methods. Relative
/// adjustments carry an explicit sign on the wire (`+5|g`, `-5|g`).
/// Setting an absolute negative value is handled by emitting a reset to
/// zero followed by the negative adjustment, as one unit, since servers
/// would otherwise interpret the bare negative value as an adjustment.
///
/// The following types are valid for gauges:
/// * `i64`
/// * `f64`
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
///
/// Note that tags are a Telegraf/InfluxDB/Datadog extension to Statsd and
/// may not be supported by all servers.
pub trait Gauged<T>
where
    T: ToGaugeValue,
{
    /// Record a gauge value with the given key
    fn gauge(&self, key: &str, value: T) -> MetricResult<Gauge> {
        self.gauge_with_tags(key, value).try_send()
    }

    /// Record a gauge value with the given key and return a `MetricBuilder`
    /// that can be used to add tags to the metric.
    fn gauge_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'_, '_, Gauge>;

    /// Adjust the gauge by the given amount relative to its current value
    fn gauge_delta(&self, key: &str, delta: T) -> MetricResult<Gauge> {
        self.gauge_delta_with_tags(key, delta).try_send()
    }

    /// Adjust the gauge by the given amount relative to its current value
    /// and return a `MetricBuilder` that can be used to add tags to the
    /// metric.
    fn gauge_delta_with_tags<'a>(&'a self, key: &'a str, delta: T) -> MetricBuilder<'_, '_, Gauge>;
}

/// Trait for recording set values.
///
/// Sets count the number of unique elements in a group. You can use them
/// to, for example, count the unique visitors to your site.
///
/// The following types are valid for sets:
/// * `i64`
///
/// See the [Statsd spec](https://github.com/b/statsd_spec) for more
/// information.
pub trait Setted<T>
where
    T: ToSetValue,
{
    /// Record a single set value with the given key
    fn set(&self, key: &str, value: T) -> MetricResult<Set> {
        self.set_with_tags(key, value).try_send()
    }

    /// Record a single set value with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn set_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'_, '_, Set>;
}

/// Trait that encompasses all other traits for sending metrics.
///
/// If you wish to use `StatsdClient` with a generic type or place a
/// `StatsdClient` instance behind a pointer (such as a `Box`) this will
/// allow you to reference all the implemented methods for recording
/// metrics, while using a single trait. An example of this is shown below.
///
/// ```
/// use std::time::Duration;
/// use tagsd::{MetricClient, StatsdClient, NopMetricSink};
///
/// let client: Box<dyn MetricClient> = Box::new(StatsdClient::from_sink(
///     "prefix", NopMetricSink));
///
/// client.count("some.counter", 1).unwrap();
/// client.incr("some.counter").unwrap();
/// client.time("some.timer", 42.0).unwrap();
/// client.time("some.timer", Duration::from_millis(42)).unwrap();
/// client.gauge("some.gauge", 8).unwrap();
/// client.gauge_delta("some.gauge", -4).unwrap();
/// client.set("some.set", 5).unwrap();
/// ```
pub trait MetricClient:
    Counted<i64>
    + CountedExt
    + Timed<f64>
    + Timed<u64>
    + Timed<Duration>
    + Gauged<i64>
    + Gauged<f64>
    + Setted<i64>
{
}

/// Typically internal client methods for sending metrics and handling
/// errors.
///
/// This trait exposes methods of the client that would normally be internal
/// but may be useful for consumers of the library to extend it in unforseen
/// ways, such as sending a custom metric type through the same sink the
/// client uses.
///
/// This trait is not exposed in the `prelude` module since it isn't
/// required to use the client for sending metrics. It is only exposed in
/// the `ext` module which is used to encompass advanced extension points
/// for the library.
///
/// NOTE: This is a sealed trait and so it cannot be implemented outside of
/// the library.
pub trait MetricBackend: Sealed {
    /// Send a fully formed `Metric` implementation via the underlying
    /// `MetricSink`
    ///
    /// The metric is expected to be fully rendered already, including any
    /// prefix or tags.
    fn send_metric<M>(&self, metric: &M) -> MetricResult<()>
    where
        M: Metric;

    /// Consume a possible error from attempting to send a metric.
    ///
    /// When callers have elected to quietly send metrics via the
    /// `MetricBuilder::send()` method, this method will be invoked if an
    /// error is encountered. By default the handler is a no-op, meaning
    /// that errors are discarded.
    fn consume_error(&self, err: MetricError);
}

/// Builder for creating and customizing `StatsdClient` instances.
///
/// Instances of the builder should be created by calling the `::builder()`
/// method on the `StatsdClient` struct.
///
/// # Example
///
/// ```
/// use tagsd::prelude::*;
/// use tagsd::{MetricError, StatsdClient, NopMetricSink};
///
/// fn my_error_handler(err: MetricError) {
///     println!("Metric error! {}", err);
/// }
///
/// let client = StatsdClient::builder("prefix", NopMetricSink)
///     .with_error_handler(my_error_handler)
///     .with_tag("environment", "production")
///     .with_tag_key("rust")
///     .build();
///
/// client.count("something", 123);
/// client.count_with_tags("some.counter", 42)
///     .with_tag("region", "us-east-2")
///     .send();
/// ```
pub struct StatsdClientBuilder {
    prefix: String,
    sink: Box<dyn MetricSink + Sync + Send + RefUnwindSafe>,
    errors: Box<dyn Fn(MetricError) + Sync + Send + RefUnwindSafe>,
    tags: Vec<(String, Option<String>)>,
    max_packet_size: usize,
}

impl StatsdClientBuilder {
    // Set the required fields and defaults for optional fields
    fn new<T>(prefix: &str, sink: T) -> Self
    where
        T: MetricSink + Sync + Send + RefUnwindSafe + 'static,
    {
        StatsdClientBuilder {
            // required
            prefix: Self::formatted_prefix(prefix),
            sink: Box::new(sink),

            // optional with defaults
            errors: Box::new(nop_error_handler),
            tags: Vec::new(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Set an error handler to use for metrics sent via `MetricBuilder::send()`
    ///
    /// The error handler is only invoked when metrics are not able to be sent
    /// correctly. Either due to invalid input, I/O errors encountered when trying
    /// to send them via a `MetricSink`, or some other reason.
    ///
    /// The error handler should consume the error without panicking. The error
    /// may be logged, printed to stderr, discarded, etc. - this is up to the
    /// implementation.
    pub fn with_error_handler<F>(mut self, errors: F) -> Self
    where
        F: Fn(MetricError) + Sync + Send + RefUnwindSafe + 'static,
    {
        self.errors = Box::new(errors);
        self
    }

    /// Add a default key-value tag to every metric published by the built
    /// [StatsdClient].
    ///
    /// Default tags are rendered in the order they were added. A per-call
    /// tag with the same key overrides the default's value for that call
    /// only.
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: ToString,
    {
        self.tags.push((key.to_string(), Some(value.to_string())));
        self
    }

    /// Add a default bare (value-less) tag key to every metric published
    /// by the built [StatsdClient].
    pub fn with_tag_key<K>(mut self, key: K) -> Self
    where
        K: ToString,
    {
        self.tags.push((key.to_string(), None));
        self
    }

    /// Bound the payload size, in bytes, of the batching sessions created
    /// by `StatsdClient::pipeline()`. The default of 512 bytes is safe for
    /// UDP on practically any network.
    pub fn with_max_packet_size(mut self, max: usize) -> Self {
        self.max_packet_size = max;
        self
    }

    /// Construct a new `StatsdClient` instance based on current settings.
    pub fn build(self) -> StatsdClient {
        StatsdClient::from_builder(self)
    }

    fn formatted_prefix(prefix: &str) -> String {
        if prefix.is_empty() {
            String::new()
        } else {
            format!("{}.", prefix.trim_end_matches('.'))
        }
    }
}

/// Client for Statsd that implements various traits to record metrics.
///
/// # Traits
///
/// The client is the main entry point for users of this library. It supports
/// several traits for recording metrics of different types.
///
/// * `Counted` for emitting counters.
/// * `Timed` for emitting timings.
/// * `Gauged` for emitting gauge values and adjustments.
/// * `Setted` for emitting set values.
/// * `MetricClient` for a combination of all of the above.
///
/// For more information about the uses for each type of metric, see the
/// documentation for each mentioned trait.
///
/// # Tags
///
/// Each metric can carry tags, rendered in the Telegraf/InfluxDB/Datadog
/// style (`stat,key=value,bare:1|c`). Default tags set when building the
/// client are merged into every metric; per-call tags override a default
/// with the same key for that call.
///
/// # Sinks
///
/// The client uses some implementation of a `MetricSink` to emit the
/// metrics. Most applications will want the `NoiselessUdpMetricSink`,
/// which lazily opens its socket and consumes every transport fault so
/// that emitting metrics can never fail or stall the instrumented code.
/// Unit tests will typically use the `NopMetricSink` or `SpyMetricSink`.
///
/// # Threading
///
/// The `StatsdClient` is designed to work in a multithreaded application.
/// All parts of the client can be shared between threads (i.e. it is
/// `Send` and `Sync`). Wrap it in an `Arc` and refer to it via the
/// `MetricClient` trait:
///
/// ``` no_run
/// use std::panic::RefUnwindSafe;
/// use std::sync::Arc;
/// use std::thread;
/// use tagsd::prelude::*;
/// use tagsd::StatsdClient;
///
/// struct MyRequestHandler {
///     metrics: Arc<dyn MetricClient + Send + Sync + RefUnwindSafe>,
/// }
///
/// impl MyRequestHandler {
///     fn new() -> MyRequestHandler {
///         MyRequestHandler {
///             metrics: Arc::new(StatsdClient::from_udp_host("some.prefix", "localhost")),
///         }
///     }
///
///     fn handle_some_request(&self) -> Result<(), String> {
///         let metric_ref = self.metrics.clone();
///         let _t = thread::spawn(move || {
///             metric_ref.count("request.handler", 1);
///         });
///
///         Ok(())
///     }
/// }
/// ```
pub struct StatsdClient {
    prefix: String,
    sink: Box<dyn MetricSink + Sync + Send + RefUnwindSafe>,
    errors: Box<dyn Fn(MetricError) + Sync + Send + RefUnwindSafe>,
    tags: Vec<(String, Option<String>)>,
    max_packet_size: usize,
}

impl StatsdClient {
    /// Create a new client instance that will use the given prefix for
    /// all metrics emitted to the given `MetricSink` implementation.
    ///
    /// Note that this client will discard errors encountered when
    /// sending metrics via the `MetricBuilder::send()` method.
    ///
    /// # No-op Example
    ///
    /// ```
    /// use tagsd::{StatsdClient, NopMetricSink};
    ///
    /// let prefix = "my.stats";
    /// let client = StatsdClient::from_sink(prefix, NopMetricSink);
    /// ```
    pub fn from_sink<T>(prefix: &str, sink: T) -> Self
    where
        T: MetricSink + Sync + Send + RefUnwindSafe + 'static,
    {
        Self::builder(prefix, sink).build()
    }

    /// Create a new client that emits to the given host over UDP via a
    /// `NoiselessUdpMetricSink` with default settings (port 8125, IPv4).
    ///
    /// Construction performs no network operations and cannot fail; the
    /// host is resolved when the first metric is emitted, and any
    /// transport fault from then on is consumed at the sink boundary.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::StatsdClient;
    ///
    /// let client = StatsdClient::from_udp_host("my.stats", "metrics.example.com");
    /// ```
    pub fn from_udp_host(prefix: &str, host: impl Into<String>) -> Self {
        Self::from_sink(prefix, NoiselessUdpMetricSink::new(host))
    }

    /// Create a new builder with the provided prefix and metric sink.
    ///
    /// A prefix and a metric sink are required to create a new client
    /// instance. All other optional customizations can be set by calling
    /// methods on the returned builder. Any customizations that aren't
    /// set by the caller will use defaults.
    ///
    /// Note, though a metric prefix is required, you may pass an empty
    /// string as a prefix. In this case, the metrics emitted will use only
    /// the bare keys supplied when you call the various methods to emit
    /// metrics.
    ///
    /// General defaults:
    ///
    /// * A no-op error handler will be used by default. Note that this
    ///   only affects errors encountered when using the `MetricBuilder::send()`
    ///   method (as opposed to `.try_send()` or any other method for sending
    ///   metrics).
    /// * No default tags.
    /// * Batching sessions bound their payloads to 512 bytes.
    pub fn builder<T>(prefix: &str, sink: T) -> StatsdClientBuilder
    where
        T: MetricSink + Sync + Send + RefUnwindSafe + 'static,
    {
        StatsdClientBuilder::new(prefix, sink)
    }

    /// Flush the underlying metric sink.
    ///
    /// This is helpful for when you'd like to buffer metrics
    /// but still want strong control over when to emit them.
    pub fn flush(&self) -> MetricResult<()> {
        Ok(self.sink.flush()?)
    }

    /// Start a batching session over this client's sink.
    ///
    /// Formatted lines queued on the session are coalesced into payloads
    /// no larger than the configured maximum packet size and handed to the
    /// sink together. The session flushes whatever it holds when it goes
    /// out of scope, on every exit path.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{Metric, StatsdClient, NopMetricSink};
    ///
    /// let client = StatsdClient::from_sink("my.stats", NopMetricSink);
    ///
    /// let shutdown = client.incr_with_tags("worker.shutdown").try_send().unwrap();
    /// let mut pipeline = client.pipeline();
    /// pipeline.emit(shutdown.as_metric_str()).unwrap();
    /// ```
    pub fn pipeline(&self) -> MetricPipeline<'_> {
        MetricPipeline::with_capacity(&*self.sink, self.max_packet_size)
    }

    /// Start a timer that will emit a `|ms` metric for the given key when
    /// stopped or dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::{StatsdClient, NopMetricSink};
    ///
    /// let client = StatsdClient::from_sink("my.stats", NopMetricSink);
    ///
    /// let timer = client.timer("requests.handle");
    /// // ... handle a request ...
    /// timer.stop().unwrap();
    /// ```
    pub fn timer<'a>(&'a self, key: &'a str) -> MetricTimer<'a> {
        MetricTimer::new(self, key)
    }

    // Create a new StatsdClient by consuming the builder
    fn from_builder(builder: StatsdClientBuilder) -> Self {
        StatsdClient {
            prefix: builder.prefix,
            sink: builder.sink,
            errors: builder.errors,
            tags: builder.tags,
            max_packet_size: builder.max_packet_size,
        }
    }

    fn tags(&self) -> impl IntoIterator<Item = (&str, Option<&str>)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl Sealed for StatsdClient {}

impl MetricBackend for StatsdClient {
    fn send_metric<M>(&self, metric: &M) -> MetricResult<()>
    where
        M: Metric,
    {
        self.sink.emit(metric.as_metric_str())?;
        Ok(())
    }

    fn consume_error(&self, err: MetricError) {
        (self.errors)(err);
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsdClient {{ prefix: {:?}, sink: ..., errors: ..., tags: {:?}, max_packet_size: {:?} }}",
            self.prefix, self.tags, self.max_packet_size,
        )
    }
}

impl<T> Counted<T> for StatsdClient
where
    T: ToCounterValue,
{
    fn count_with_tags<'a>(&'a self, key: &'a str, count: T) -> MetricBuilder<'_, '_, Counter> {
        match count.try_to_value() {
            Ok(v) => MetricBuilder::from_fmt(
                MetricFormatter::counter(&self.prefix, key, v).with_tags(self.tags()),
                self,
            ),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }
}

impl CountedExt for StatsdClient {}

impl<T> Timed<T> for StatsdClient
where
    T: ToTimerValue,
{
    fn time_with_tags<'a>(&'a self, key: &'a str, time: T) -> MetricBuilder<'_, '_, Timer> {
        match time.try_to_value() {
            Ok(v) => MetricBuilder::from_fmt(
                MetricFormatter::timer(&self.prefix, key, v).with_tags(self.tags()),
                self,
            ),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }
}

impl<T> Gauged<T> for StatsdClient
where
    T: ToGaugeValue,
{
    fn gauge_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'_, '_, Gauge> {
        match value.try_to_value() {
            Ok(v) => MetricBuilder::from_fmt(
                MetricFormatter::gauge(&self.prefix, key, v).with_tags(self.tags()),
                self,
            ),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }

    fn gauge_delta_with_tags<'a>(&'a self, key: &'a str, delta: T) -> MetricBuilder<'_, '_, Gauge> {
        match delta.try_to_value() {
            Ok(v) => MetricBuilder::from_fmt(
                MetricFormatter::gauge_delta(&self.prefix, key, v).with_tags(self.tags()),
                self,
            ),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }
}

impl<T> Setted<T> for StatsdClient
where
    T: ToSetValue,
{
    fn set_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'_, '_, Set> {
        match value.try_to_value() {
            Ok(v) => MetricBuilder::from_fmt(
                MetricFormatter::set(&self.prefix, key, v).with_tags(self.tags()),
                self,
            ),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }
}

impl MetricClient for StatsdClient {}

#[allow(clippy::needless_pass_by_value)]
fn nop_error_handler(_err: MetricError) {
    // nothing
}

#[cfg(test)]
mod tests {
    use super::{Counted, CountedExt, Gauged, MetricClient, Setted, StatsdClient, Timed};
    use crate::sinks::{MetricSink, NopMetricSink, SpyMetricSink};
    use crate::types::{Metric, MetricError};
    use std::io;
    use std::panic::RefUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_statsd_client_empty_prefix() {
        let client = StatsdClient::from_sink("", NopMetricSink);
        let res = client.count("some.method", 1);

        assert_eq!("some.method:1|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_incr_with_prefix() {
        let client = StatsdClient::from_sink("app", NopMetricSink);
        let res = client.incr("x");

        assert_eq!("app.x:1|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_count_by_amount() {
        let client = StatsdClient::from_sink("", NopMetricSink);
        let res = client.count("stat", 5);

        assert_eq!("stat:5|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_incr_by_and_decr_by() {
        let client = StatsdClient::from_sink("", NopMetricSink);

        let res = client.incr_by("stat", 5);
        assert_eq!("stat:5|c", res.unwrap().as_metric_str());

        let res = client.decr_by("stat", 5);
        assert_eq!("stat:-5|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_decr() {
        let client = StatsdClient::from_sink("prefix", NopMetricSink);
        let res = client.decr("some.counter");

        assert_eq!("prefix.some.counter:-1|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_default_tags_are_included() {
        let client = StatsdClient::builder("", NopMetricSink)
            .with_tag("stage", "prod")
            .build();
        let res = client.incr("dummy.namespace");

        assert_eq!("dummy.namespace,stage=prod:1|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_event_level_tags() {
        let client = StatsdClient::from_sink("", NopMetricSink);
        let res = client
            .incr_with_tags("dummy.namespace")
            .with_tag("scope", "user")
            .try_send();

        assert_eq!("dummy.namespace,scope=user:1|c", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_call_tags_override_default_tags() {
        let client = StatsdClient::builder("", NopMetricSink)
            .with_tag("stage", "prod")
            .with_tag("region", "us-east")
            .build();
        let res = client
            .incr_with_tags("dummy.namespace")
            .with_tag("stage", "canary")
            .try_send();

        assert_eq!(
            "dummy.namespace,stage=canary,region=us-east:1|c",
            res.unwrap().as_metric_str()
        );
    }

    #[test]
    fn test_statsd_client_merged_tag_ordering() {
        let client = StatsdClient::builder("prefix", NopMetricSink)
            .with_tag("hello", "world")
            .with_tag_key("production")
            .build();
        let res = client
            .count_with_tags("some.counter", 3)
            .with_tag("foo", "bar")
            .with_tag_key("fizz")
            .try_send();

        assert_eq!(
            "prefix.some.counter,hello=world,production,foo=bar,fizz:3|c",
            res.unwrap().as_metric_str()
        );
    }

    #[test]
    fn test_statsd_client_time_f64() {
        let client = StatsdClient::from_sink("prefix", NopMetricSink);
        let res = client.time("key", 157.5);

        assert_eq!("prefix.key:157.500000|ms", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_time_u64() {
        let client = StatsdClient::from_sink("prefix", NopMetricSink);
        let res = client.time("key", 157);

        assert_eq!("prefix.key:157.000000|ms", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_time_duration() {
        let client = StatsdClient::from_sink("prefix", NopMetricSink);
        let res = client.time("key", Duration::from_millis(157));

        assert_eq!("prefix.key:157.000000|ms", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_gauge() {
        let client = StatsdClient::from_sink("prefix", NopMetricSink);

        let res = client.gauge("some.gauge", 4);
        assert_eq!("prefix.some.gauge:4|g", res.unwrap().as_metric_str());

        let res = client.gauge("some.gauge", 4.5);
        assert_eq!("prefix.some.gauge:4.5|g", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_gauge_delta_signs() {
        let client = StatsdClient::from_sink("", NopMetricSink);

        let res = client.gauge_delta("stat", 5);
        assert_eq!("stat:+5|g", res.unwrap().as_metric_str());

        let res = client.gauge_delta("stat", -5);
        assert_eq!("stat:-5|g", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_negative_gauge_sends_reset_pair() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::from_sink("", sink);

        let res = client.gauge("stat", -5);
        assert_eq!("stat:-5|g", res.unwrap().as_metric_str());

        // both lines leave as a single payload, reset first
        assert_eq!(b"stat:0|g\nstat:-5|g\n".to_vec(), rx.recv().unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_statsd_client_negative_gauge_carries_tags_on_both_lines() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::builder("", sink).with_tag("stage", "prod").build();

        client.gauge("stat", -7).unwrap();

        assert_eq!(
            b"stat,stage=prod:0|g\nstat,stage=prod:-7|g\n".to_vec(),
            rx.recv().unwrap()
        );
    }

    #[test]
    fn test_statsd_client_set() {
        let client = StatsdClient::from_sink("myapp", NopMetricSink);
        let res = client.set("some.set", 3);

        assert_eq!("myapp.some.set:3|s", res.unwrap().as_metric_str());
    }

    #[test]
    fn test_statsd_client_sampled_metric_carries_rate_suffix() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::from_sink("", sink);

        // sampled at 1.0, sent every time with no suffix; any other rate
        // renders the suffix on the lines that do go out
        client.count_with_tags("stat", 1).with_sample_rate(1.0).send();
        assert_eq!(b"stat:1|c".to_vec(), rx.recv().unwrap());

        for _ in 0..100 {
            client.count_with_tags("stat", 1).with_sample_rate(0.5).send();
        }
        for sent in rx.try_iter() {
            assert_eq!(b"stat:1|c|@0.5".to_vec(), sent);
        }
    }

    #[test]
    fn test_statsd_client_with_tags_send_success() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::from_sink("prefix", sink);

        client.count_with_tags("some.key", 1).with_tag("test", "a").send();
        let sent = rx.recv().unwrap();

        assert_eq!("prefix.some.key,test=a:1|c", String::from_utf8(sent).unwrap());
    }

    #[test]
    fn test_statsd_client_with_tags_send_error() {
        struct ErrorSink;

        impl MetricSink for ErrorSink {
            fn emit(&self, _metric: &str) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::Other))
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let count_ref = count.clone();

        let handler = move |_err: MetricError| {
            count_ref.fetch_add(1, Ordering::Release);
        };

        let client = StatsdClient::builder("prefix", ErrorSink)
            .with_error_handler(handler)
            .build();

        client.count_with_tags("some.key", 1).with_tag("tier", "web").send();

        assert_eq!(1, count.load(Ordering::Acquire));
    }

    #[test]
    fn test_statsd_client_pipeline_coalesces() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::from_sink("", sink);

        {
            let mut pipeline = client.pipeline();
            pipeline.emit("a:1|c").unwrap();
            pipeline.emit("b:2|c").unwrap();
        }

        assert_eq!(b"a:1|c\nb:2|c\n".to_vec(), rx.recv().unwrap());
    }

    #[test]
    fn test_statsd_client_pipeline_respects_max_packet_size() {
        let (rx, sink) = SpyMetricSink::new();
        let client = StatsdClient::builder("", sink).with_max_packet_size(10).build();

        let mut pipeline = client.pipeline();
        pipeline.emit("aaaa:1|c").unwrap();
        pipeline.emit("bbbb:2|c").unwrap();

        // no room for both lines in one 10 byte payload
        assert_eq!(b"aaaa:1|c\n".to_vec(), rx.recv().unwrap());
    }

    // The following tests really just ensure that we've actually
    // implemented all the traits we're supposed to correctly. If
    // we hadn't, this wouldn't compile.

    #[test]
    fn test_statsd_client_as_counted() {
        let client: Box<dyn Counted<i64>> = Box::new(StatsdClient::from_sink("prefix", NopMetricSink));

        client.count("some.counter", 5).unwrap();
    }

    #[test]
    fn test_statsd_client_as_countedext() {
        let client: Box<dyn CountedExt> = Box::new(StatsdClient::from_sink("prefix", NopMetricSink));

        client.incr("some.counter").unwrap();
        client.decr_by("some.counter", 2).unwrap();
    }

    #[test]
    fn test_statsd_client_as_timed() {
        let client: Box<dyn Timed<Duration>> = Box::new(StatsdClient::from_sink("prefix", NopMetricSink));

        client.time("some.timer", Duration::from_millis(20)).unwrap();
    }

    #[test]
    fn test_statsd_client_as_gauged() {
        let client: Box<dyn Gauged<f64>> = Box::new(StatsdClient::from_sink("prefix", NopMetricSink));

        client.gauge("some.gauge", 3.2).unwrap();
        client.gauge_delta("some.gauge", -0.7).unwrap();
    }

    #[test]
    fn test_statsd_client_as_setted() {
        let client: Box<dyn Setted<i64>> = Box::new(StatsdClient::from_sink("myapp", NopMetricSink));

        client.set("some.set", 5).unwrap();
    }

    #[test]
    fn test_statsd_client_as_thread_and_panic_safe() {
        let client: Box<dyn MetricClient + Send + Sync + RefUnwindSafe> =
            Box::new(StatsdClient::from_sink("prefix", NopMetricSink));

        client.count("some.counter", 3).unwrap();
        client.time("some.timer", 198.0).unwrap();
        client.time("some.timer", Duration::from_millis(198)).unwrap();
        client.gauge("some.gauge", 4).unwrap();
        client.gauge_delta("some.gauge", -4).unwrap();
        client.set("some.set", 5).unwrap();
    }
}
