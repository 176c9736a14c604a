//! Secure association key material.

use crate::ParseError;
use std::fmt;

/// Secure Association Key record: cipher key, GHASH subkey and, for XPN
/// suites, the 12-byte salt.
///
/// Built once and handed by value to the SA install call. The bytes are
/// overwritten with zeros when the value is dropped, and `Debug` never prints
/// them.
#[derive(Clone, PartialEq, Eq)]
pub struct Sak {
    key: [u8; 32],
    key_len: usize,
    h_key: [u8; 16],
    salt: Option<[u8; 12]>,
}

impl Sak {
    /// Creates a key record for a non-XPN suite.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidKeyLength`] unless `key` is 16 or 32 bytes.
    pub fn new(key: &[u8], h_key: [u8; 16]) -> Result<Self, ParseError> {
        let key_len = key.len();
        if key_len != 16 && key_len != 32 {
            return Err(ParseError::InvalidKeyLength(key_len));
        }
        let mut buf = [0u8; 32];
        buf[..key_len].copy_from_slice(key);
        Ok(Sak {
            key: buf,
            key_len,
            h_key,
            salt: None,
        })
    }

    /// Creates a key record carrying the XPN salt.
    pub fn with_salt(key: &[u8], h_key: [u8; 16], salt: [u8; 12]) -> Result<Self, ParseError> {
        let mut sak = Sak::new(key, h_key)?;
        sak.salt = Some(salt);
        Ok(sak)
    }

    pub fn key(&self) -> &[u8] {
        &self.key[..self.key_len]
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn h_key(&self) -> &[u8; 16] {
        &self.h_key
    }

    pub fn salt(&self) -> Option<&[u8; 12]> {
        self.salt.as_ref()
    }
}

impl fmt::Debug for Sak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sak")
            .field("key_len", &self.key_len)
            .field("salt", &self.salt.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Sak {
    fn drop(&mut self) {
        wipe(&mut self.key);
        wipe(&mut self.h_key);
        if let Some(salt) = self.salt.as_mut() {
            wipe(salt);
        }
    }
}

/// Zeroes `buf` with volatile stores so the wipe survives dead-store
/// elimination. Used for every transient copy of key material.
pub fn wipe<T: Copy + Default>(buf: &mut [T]) {
    for item in buf.iter_mut() {
        // SAFETY: `item` is a valid, aligned, exclusive reference.
        unsafe { std::ptr::write_volatile(item, T::default()) };
    }
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
}

/// Short SCI used in place of the full SCI by XPN cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ssci([u8; 4]);

impl Ssci {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Ssci(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn from_u32(value: u32) -> Self {
        Ssci(value.to_be_bytes())
    }
}
