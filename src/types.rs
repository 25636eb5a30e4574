// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error;
use std::fmt;
use std::io;

/// Trait for metrics which have been fully rendered to the tagged Statsd
/// wire format.
///
/// The string representation includes the prefix, any tags, the value, and
/// the metric type suffix. It does not include a trailing newline.
pub trait Metric {
    fn as_metric_str(&self) -> &str;
}

macro_rules! metric_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            repr: String,
        }

        impl From<String> for $name {
            fn from(line: String) -> Self {
                $name { repr: line }
            }
        }

        impl Metric for $name {
            fn as_metric_str(&self) -> &str {
                &self.repr
            }
        }
    };
}

metric_type!(
    /// Counter that has been rendered to the wire format (`|c` suffix)
    Counter
);

metric_type!(
    /// Timing in milliseconds that has been rendered to the wire format
    /// (`|ms` suffix)
    Timer
);

metric_type!(
    /// Gauge value that has been rendered to the wire format (`|g` suffix)
    Gauge
);

metric_type!(
    /// Set member that has been rendered to the wire format (`|s` suffix)
    Set
);

/// Broad categories of things that can go wrong emitting metrics.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    InvalidInput,
    IoError,
}

/// Error generated while formatting or emitting a metric.
///
/// Note that the transport implementations in this crate are "noiseless":
/// I/O and resolution failures are consumed at the sink boundary and handed
/// to an injected fault handler instead of being returned from the methods
/// used to emit metrics. Callers will typically only see this type when
/// supplying invalid input, such as an out-of-range sample rate.
#[derive(Debug)]
pub struct MetricError {
    repr: ErrorRepr,
}

#[derive(Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    IoError(io::Error),
}

impl MetricError {
    /// Return the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::IoError(_) => ErrorKind::IoError,
            ErrorRepr::WithDescription(kind, _) => kind,
        }
    }
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::IoError(ref err) => err.fmt(f),
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
        }
    }
}

impl error::Error for MetricError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> MetricError {
        MetricError {
            repr: ErrorRepr::IoError(err),
        }
    }
}

impl From<(ErrorKind, &'static str)> for MetricError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MetricError {
        MetricError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

pub type MetricResult<T> = Result<T, MetricError>;

#[cfg(test)]
mod tests {
    use super::{Counter, ErrorKind, Gauge, Metric, MetricError, Set, Timer};
    use std::error::Error;
    use std::io;

    #[test]
    fn test_metric_types_from_rendered_line() {
        assert_eq!(
            "test.counter,host=web01:4|c",
            Counter::from("test.counter,host=web01:4|c".to_string()).as_metric_str()
        );
        assert_eq!(
            "test.timer:34.000000|ms",
            Timer::from("test.timer:34.000000|ms".to_string()).as_metric_str()
        );
        assert_eq!("test.gauge:2|g", Gauge::from("test.gauge:2|g".to_string()).as_metric_str());
        assert_eq!("test.set:9|s", Set::from("test.set:9|s".to_string()).as_metric_str());
    }

    #[test]
    fn test_metric_error_kind_io() {
        let err = MetricError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(ErrorKind::IoError, err.kind());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_metric_error_kind_with_description() {
        let err = MetricError::from((ErrorKind::InvalidInput, "bad rate"));
        assert_eq!(ErrorKind::InvalidInput, err.kind());
        assert_eq!("bad rate", format!("{}", err));
        assert!(err.source().is_none());
    }
}
