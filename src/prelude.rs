// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Export commonly used parts of the crate for easy glob imports
//!
//! # Example
//!
//! ```
//! use tagsd::prelude::*;
//! use tagsd::{StatsdClient, NopMetricSink};
//!
//! let client = StatsdClient::from_sink("some.prefix", NopMetricSink);
//!
//! client.count("some.counter", 1).unwrap();
//! client.time("some.timer", 23.0).unwrap();
//! client.gauge("some.gauge", 45).unwrap();
//! client.set("some.set", 123).unwrap();
//! ```

pub use crate::client::{Counted, CountedExt, Gauged, MetricClient, Setted, Timed};
