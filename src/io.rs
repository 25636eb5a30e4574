// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io::{self, BufWriter, Write};

/// Buffered implementation of the `Write` trait that joins every input
/// written with newlines and hands the accumulated block to the underlying
/// writer in a single call.
///
/// Inputs larger than the configured capacity bypass the buffer (after any
/// already buffered inputs are flushed, preserving ordering) and are written
/// directly to the underlying writer, without a trailing newline: the
/// newline only exists to separate multiple inputs within one block.
#[derive(Debug)]
pub(crate) struct MultiLineWriter<T>
where
    T: Write,
{
    written: usize,
    capacity: usize,
    inner: BufWriter<T>,
}

impl<T> MultiLineWriter<T>
where
    T: Write,
{
    pub fn new(inner: T, cap: usize) -> MultiLineWriter<T> {
        MultiLineWriter {
            written: 0,
            capacity: cap,
            inner: BufWriter::with_capacity(cap, inner),
        }
    }

    /// Gets a reference to the underlying writer.
    #[cfg(test)]
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }
}

impl<T> Write for MultiLineWriter<T>
where
    T: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let required = buf.len() + 1;

        if required > self.capacity {
            // flush anything already buffered so blocks stay ordered
            if self.written > 0 {
                self.flush()?;
            }
            Ok(self.inner.get_mut().write(buf)?)
        } else {
            if self.capacity - self.written < required {
                self.flush()?;
            }

            // Track bytes after each write in case either returns an error
            // partway through. Only the caller's bytes count towards the
            // return value per the `Write::write` contract, the newline is
            // an implementation detail.
            let written = self.inner.write(buf)?;
            self.written += written;
            self.written += self.inner.write(b"\n")?;

            Ok(written)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.written = 0;
        Ok(())
    }
}
