// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::sample_rate::SampleRate;
use crate::client::{MetricBackend, StatsdClient};
use crate::types::{Metric, MetricError, MetricResult};
use std::fmt::{self, Write};
use std::marker::PhantomData;

mod sample_rate;

/// Type of metric that knows its wire suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    Counter,
    Timer,
    Gauge,
    Set,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricType::Counter => "c".fmt(f),
            MetricType::Timer => "ms".fmt(f),
            MetricType::Gauge => "g".fmt(f),
            MetricType::Set => "s".fmt(f),
        }
    }
}

/// Holder for primitive metric values that knows how to display itself.
///
/// This struct is internal to how the various types that are valid for each
/// kind of metric (types implementing `ToCounterValue`, `ToTimerValue`, etc.)
/// are rendered but is exposed for advanced use cases.
///
/// Typical use of this crate shouldn't require interacting with this type.
#[derive(Debug, Clone, Copy)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    /// Milliseconds, always rendered with six digit fixed-point precision
    Millis(f64),
}

impl MetricValue {
    fn is_negative(self) -> bool {
        match self {
            MetricValue::Signed(v) => v < 0,
            MetricValue::Unsigned(_) => false,
            MetricValue::Float(v) => v < 0.0,
            MetricValue::Millis(v) => v < 0.0,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Signed(v) => v.fmt(f),
            MetricValue::Unsigned(v) => v.fmt(f),
            MetricValue::Float(v) => v.fmt(f),
            MetricValue::Millis(v) => write!(f, "{:.6}", v),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MetricFormatter<'a> {
    prefix: &'a str,
    key: &'a str,
    val: MetricValue,
    type_: MetricType,
    delta: bool,
    tags: Vec<(&'a str, Option<&'a str>)>,
    rate: Option<SampleRate>,
}

impl<'a> MetricFormatter<'a> {
    pub(crate) fn counter(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Counter)
    }

    pub(crate) fn timer(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Timer)
    }

    pub(crate) fn gauge(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Gauge)
    }

    pub(crate) fn gauge_delta(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        let mut fmt = Self::from_val(prefix, key, val, MetricType::Gauge);
        fmt.delta = true;
        fmt
    }

    pub(crate) fn set(prefix: &'a str, key: &'a str, val: MetricValue) -> Self {
        Self::from_val(prefix, key, val, MetricType::Set)
    }

    fn from_val(prefix: &'a str, key: &'a str, val: MetricValue, type_: MetricType) -> Self {
        MetricFormatter {
            prefix,
            key,
            val,
            type_,
            delta: false,
            tags: Vec::new(),
            rate: None,
        }
    }

    /// Add or override a single tag.
    ///
    /// A tag whose key is already present replaces the existing value in
    /// place, keeping the original position. This is what lets per-call tags
    /// shadow the client's default tags for the same key while the rendered
    /// order stays stable.
    fn set_tag(&mut self, key: &'a str, value: Option<&'a str>) {
        if let Some(entry) = self.tags.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.tags.push((key, value));
        }
    }

    pub(crate) fn with_tag(&mut self, key: &'a str, value: &'a str) {
        self.set_tag(key, Some(value));
    }

    pub(crate) fn with_tag_key(&mut self, key: &'a str) {
        self.set_tag(key, None);
    }

    pub(crate) fn with_tags<T>(mut self, tags: T) -> Self
    where
        T: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        for (key, value) in tags {
            self.set_tag(key, value);
        }
        self
    }

    pub(crate) fn with_sample_rate(&mut self, rate: SampleRate) {
        self.rate = Some(rate);
    }

    /// Decide whether the current call is kept, drawing at most once.
    pub(crate) fn roll(&self) -> bool {
        self.rate.as_ref().map_or(true, SampleRate::roll)
    }

    /// An absolute (non-delta) gauge set to a negative value needs the
    /// reset-then-set pair since servers reject negative absolute gauges.
    pub(crate) fn needs_gauge_reset(&self) -> bool {
        self.type_ == MetricType::Gauge && !self.delta && self.val.is_negative()
    }

    pub(crate) fn format(&self) -> String {
        self.format_line(self.val, true)
    }

    /// The `0|g` line that precedes a negative absolute gauge value. Sent
    /// unconditionally: the draw for the whole pair already happened.
    pub(crate) fn format_gauge_reset(&self) -> String {
        self.format_line(MetricValue::Signed(0), false)
    }

    /// The value half of the reset-then-set pair, also without a rate
    /// suffix.
    pub(crate) fn format_unsampled(&self) -> String {
        self.format_line(self.val, false)
    }

    fn format_line(&self, val: MetricValue, with_rate: bool) -> String {
        let mut out = String::with_capacity(self.size_hint());
        out.push_str(self.prefix);
        out.push_str(self.key);

        for &(key, value) in &self.tags {
            out.push(',');
            out.push_str(key);
            // an empty value renders the same as a bare key
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                out.push('=');
                out.push_str(value);
            }
        }

        out.push(':');
        if self.delta && !val.is_negative() {
            out.push('+');
        }
        let _ = write!(out, "{}|{}", val, self.type_);

        if with_rate {
            if let Some(rate) = self.rate.as_ref().filter(|r| !r.is_always()) {
                out.push_str(rate.suffix());
            }
        }

        out
    }

    fn size_hint(&self) -> usize {
        let tags: usize = self
            .tags
            .iter()
            .map(|(k, v)| 2 + k.len() + v.map_or(0, str::len))
            .sum();
        let rate = self.rate.as_ref().map_or(0, |r| r.suffix().len());

        self.prefix.len() + self.key.len() + tags + 1 /* : */ + 21 /* value */ + 3 /* |ms */ + rate
    }
}

/// Internal state of a `MetricBuilder`
///
/// The builder can either be in the process of formatting a metric to send
/// via a client or it can be simply holding on to an error that it will be
/// dealt with when `.try_send()` or `.send()` is finally invoked.
#[derive(Debug)]
enum BuilderRepr<'m, 'c> {
    Success(MetricFormatter<'m>, &'c StatsdClient),
    Error(MetricError, &'c StatsdClient),
}

/// Builder for attaching tags and a sample rate to in-progress metrics.
///
/// The builder is created by the metric methods on `StatsdClient` and the
/// metric is rendered and handed to the underlying sink when either
/// `.try_send()` or `.send()` is invoked. Any errors encountered while
/// constructing or sending a metric are propagated then.
///
/// Tags are key-value pairs (`region=us-east`) or bare keys (`beta`), an
/// extension over plain Statsd understood by Telegraf, InfluxDB, and
/// Datadog style servers. A per-call tag overrides a default tag from the
/// client with the same key.
///
/// The sample rate is the probability that the call produces anything on
/// the wire at all. Each call draws once; a rejected draw means the call
/// quietly produces nothing and the returned result is still `Ok`.
///
/// NOTE: The only way to instantiate an instance of this builder is via
/// methods on the `StatsdClient` client.
///
/// # Example
///
/// ```
/// use tagsd::prelude::*;
/// use tagsd::{StatsdClient, NopMetricSink, Metric};
///
/// let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
/// let res = client.count_with_tags("some.key", 1)
///    .with_tag("host", "app11.example.com")
///    .with_tag_key("beta")
///    .try_send();
///
/// assert_eq!(
///     "some.prefix.some.key,host=app11.example.com,beta:1|c",
///     res.unwrap().as_metric_str()
/// );
/// ```
#[must_use = "Did you forget to call .send() after adding tags?"]
#[derive(Debug)]
pub struct MetricBuilder<'m, 'c, T>
where
    T: Metric + From<String>,
{
    repr: BuilderRepr<'m, 'c>,
    type_: PhantomData<T>,
}

impl<'m, 'c, T> MetricBuilder<'m, 'c, T>
where
    T: Metric + From<String>,
{
    pub(crate) fn from_fmt(formatter: MetricFormatter<'m>, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Success(formatter, client),
            type_: PhantomData,
        }
    }

    pub(crate) fn from_error(err: MetricError, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Error(err, client),
            type_: PhantomData,
        }
    }

    /// Add a key-value tag to this metric, overriding any default tag the
    /// client was built with for the same key.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{StatsdClient, NopMetricSink, Metric};
    ///
    /// let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
    /// let res = client.count_with_tags("some.key", 1)
    ///    .with_tag("user", "authenticated")
    ///    .try_send();
    ///
    /// assert_eq!(
    ///    "some.prefix.some.key,user=authenticated:1|c",
    ///    res.unwrap().as_metric_str()
    /// );
    /// ```
    pub fn with_tag(mut self, key: &'m str, value: &'m str) -> Self {
        if let BuilderRepr::Success(ref mut formatter, _) = self.repr {
            formatter.with_tag(key, value);
        }
        self
    }

    /// Add a bare (value-less) tag key to this metric.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{StatsdClient, NopMetricSink, Metric};
    ///
    /// let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
    /// let res = client.count_with_tags("some.key", 4)
    ///    .with_tag_key("beta-testing")
    ///    .try_send();
    ///
    /// assert_eq!(
    ///    "some.prefix.some.key,beta-testing:4|c",
    ///    res.unwrap().as_metric_str()
    /// );
    /// ```
    pub fn with_tag_key(mut self, key: &'m str) -> Self {
        if let BuilderRepr::Success(ref mut formatter, _) = self.repr {
            formatter.with_tag_key(key);
        }
        self
    }

    /// Sample this metric at the given rate, in `(0.0, 1.0]`.
    ///
    /// A single uniform draw per call decides whether anything is sent; a
    /// rejected draw produces no bytes on the wire and no error. Rates
    /// other than `1.0` are rendered as an `|@<rate>` suffix. A rate
    /// outside the valid range turns into an `InvalidInput` error when the
    /// metric is finally sent.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{StatsdClient, NopMetricSink};
    ///
    /// let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
    /// client.count_with_tags("requests.handled", 1)
    ///    .with_sample_rate(0.1)
    ///    .send();
    /// ```
    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        self.repr = match self.repr {
            BuilderRepr::Success(mut formatter, client) => match SampleRate::try_from(rate) {
                Ok(rate) => {
                    formatter.with_sample_rate(rate);
                    BuilderRepr::Success(formatter, client)
                }
                Err(e) => BuilderRepr::Error(e, client),
            },
            err => err,
        };
        self
    }

    /// Send a metric using the client that created this builder.
    ///
    /// A metric dropped by its sample rate is still returned as `Ok`, it
    /// just never reaches the sink. Note that the builder is consumed by
    /// this method and thus `.try_send()` can only be called a single time
    /// per builder.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{StatsdClient, NopMetricSink, Metric};
    ///
    /// let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
    /// let res = client.gauge_with_tags("some.key", 7)
    ///    .with_tag("test-segment", "12345")
    ///    .try_send();
    ///
    /// assert_eq!(
    ///    "some.prefix.some.key,test-segment=12345:7|g",
    ///    res.unwrap().as_metric_str()
    /// );
    /// ```
    pub fn try_send(self) -> MetricResult<T> {
        match self.repr {
            BuilderRepr::Error(err, _) => Err(err),
            BuilderRepr::Success(ref formatter, client) => {
                if !formatter.roll() {
                    // sampled out: a valid non-event, nothing reaches the sink
                    return Ok(T::from(formatter.format()));
                }

                if formatter.needs_gauge_reset() {
                    // Reset-then-set so the server accepts the negative
                    // absolute value. Both lines go through one batching
                    // session as a unit and neither is sampled again.
                    let metric = T::from(formatter.format_unsampled());
                    let mut pipeline = client.pipeline();
                    pipeline.emit(&formatter.format_gauge_reset())?;
                    pipeline.emit(metric.as_metric_str())?;
                    pipeline.flush()?;
                    Ok(metric)
                } else {
                    let metric = T::from(formatter.format());
                    client.send_metric(&metric)?;
                    Ok(metric)
                }
            }
        }
    }

    /// Send a metric using the client that created this builder, discarding
    /// successful results and invoking the client's error handler for error
    /// results.
    ///
    /// By default, if no handler is given, a "no-op" handler is used that
    /// simply discards all errors. If this isn't desired, a custom handler
    /// should be supplied when creating a new `StatsdClient` instance.
    ///
    /// Note that the builder is consumed by this method and thus `.send()`
    /// can only be called a single time per builder.
    ///
    /// # Example
    ///
    /// ```
    /// use tagsd::prelude::*;
    /// use tagsd::{StatsdClient, MetricError, NopMetricSink};
    ///
    /// fn my_handler(err: MetricError) {
    ///     println!("Metric error: {}", err);
    /// }
    ///
    /// let client = StatsdClient::builder("some.prefix", NopMetricSink)
    ///     .with_error_handler(my_handler)
    ///     .build();
    ///
    /// client.gauge_with_tags("some.key", 7)
    ///    .with_tag("region", "us-west-1")
    ///    .send();
    /// ```
    pub fn send(self) {
        match self.repr {
            BuilderRepr::Error(err, client) => client.consume_error(err),
            BuilderRepr::Success(_, client) => {
                if let Err(e) = self.try_send() {
                    client.consume_error(e);
                }
            }
        }
    }
}
