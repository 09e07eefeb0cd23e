//! Byte weights for cached values.
//!
//! The gateway needs a size for each computed value before it can offer it to
//! the store. Values report their own weight through [`ByteSize`].

use std::sync::Arc;

use bytes::Bytes;

/// Size of a value in bytes, as charged against the store capacity.
pub trait ByteSize {
    fn byte_size(&self) -> u64;
}

impl ByteSize for Bytes {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSize for [u8] {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ByteSize + ?Sized> ByteSize for Arc<T> {
    fn byte_size(&self) -> u64 {
        (**self).byte_size()
    }
}
