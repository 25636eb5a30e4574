// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::MetricBuilder;
use crate::client::{StatsdClient, Timed};
use crate::types::{MetricResult, Timer};
use std::time::{Duration, Instant};

/// Scoped timer that measures the interval between its creation and the
/// point where it is stopped, then emits the elapsed time in milliseconds
/// through the client's normal timing path.
///
/// Instances are created with `StatsdClient::timer`. Call `stop` to end
/// the measured interval and get the sent metric back; a timer that goes
/// out of scope without being stopped emits quietly on drop, with any
/// error handed to the client's error handler.
///
/// # Example
///
/// ```
/// use tagsd::{StatsdClient, NopMetricSink};
///
/// let client = StatsdClient::from_sink("my.stats", NopMetricSink);
///
/// {
///     let _timer = client.timer("requests.db_lookup");
///     // ... the interval being measured ...
/// } // emitted here
/// ```
#[must_use = "The timer measures until it is stopped or dropped"]
#[derive(Debug)]
pub struct MetricTimer<'a> {
    client: &'a StatsdClient,
    key: &'a str,
    start: Instant,
    rate: Option<f32>,
    tags: Vec<(&'a str, Option<&'a str>)>,
    armed: bool,
}

impl<'a> MetricTimer<'a> {
    pub(crate) fn new(client: &'a StatsdClient, key: &'a str) -> MetricTimer<'a> {
        MetricTimer {
            client,
            key,
            start: Instant::now(),
            rate: None,
            tags: Vec::new(),
            armed: true,
        }
    }

    /// Add a key-value tag to the emitted timing.
    pub fn with_tag(mut self, key: &'a str, value: &'a str) -> Self {
        self.tags.push((key, Some(value)));
        self
    }

    /// Add a bare (value-less) tag key to the emitted timing.
    pub fn with_tag_key(mut self, key: &'a str) -> Self {
        self.tags.push((key, None));
        self
    }

    /// Sample the emitted timing at the given rate, in `(0.0, 1.0]`.
    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    /// End the measured interval and emit the elapsed milliseconds,
    /// returning the sent metric.
    pub fn stop(mut self) -> MetricResult<Timer> {
        self.armed = false;
        self.builder(self.start.elapsed()).try_send()
    }

    fn builder(&self, elapsed: Duration) -> MetricBuilder<'a, 'a, Timer> {
        let mut builder = self.client.time_with_tags(self.key, elapsed);
        for &(key, value) in &self.tags {
            builder = match value {
                Some(value) => builder.with_tag(key, value),
                None => builder.with_tag_key(key),
            };
        }
        if let Some(rate) = self.rate {
            builder = builder.with_sample_rate(rate);
        }
        builder
    }
}

impl Drop for MetricTimer<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            self.builder(self.start.elapsed()).send();
        }
    }
}
