//! Capacity-bounded output buffers.
//!
//! Every producing operation in the engine writes into an [`OutputBuffer`] whose
//! capacity is fixed up front, usually as a small multiple of the input length.
//! Running past the capacity is reported as [`Overflow`] instead of growing the
//! buffer or truncating the output, so callers decide whether to retry with a
//! larger budget, chunk the input, or skip it.

use thiserror::Error;

/// Output length exceeded the capacity the caller allowed for.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("output overflow: {needed} units needed, capacity is {capacity}")]
pub struct Overflow {
    /// Units the operation tried to hold when it gave up.
    pub needed: usize,
    /// Capacity of the buffer.
    pub capacity: usize,
}

/// Capacity for an input of `input_len` units scaled by `factor`.
#[inline]
pub fn capacity_for(input_len: usize, factor: usize) -> usize {
    input_len.saturating_mul(factor)
}

/// A growable buffer that refuses to hold more than `capacity` elements.
///
/// The backing `Vec` only allocates what is actually written; the capacity is
/// a contract, not a preallocation.
#[derive(Debug, Clone)]
pub struct OutputBuffer<T> {
    data: Vec<T>,
    capacity: usize,
}

impl<T> OutputBuffer<T> {
    /// Create an empty buffer bounded by `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }

    /// Append one element.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), Overflow> {
        self.reserve(1)?;
        self.data.push(value);
        Ok(())
    }

    /// Fail unless `additional` more elements fit.
    #[inline]
    pub fn reserve(&self, additional: usize) -> Result<(), Overflow> {
        let needed = self.data.len().saturating_add(additional);
        if needed > self.capacity {
            return Err(Overflow {
                needed,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}

/// A string builder bounded by a byte capacity.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    capacity: usize,
}

impl TextBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity,
        }
    }

    /// Append `s`, all or nothing.
    pub fn push_str(&mut self, s: &str) -> Result<(), Overflow> {
        let needed = self.text.len().saturating_add(s.len());
        if needed > self.capacity {
            return Err(Overflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.text.push_str(s);
        Ok(())
    }

    pub fn push(&mut self, c: char) -> Result<(), Overflow> {
        let mut utf8 = [0u8; 4];
        self.push_str(c.encode_utf8(&mut utf8))
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
