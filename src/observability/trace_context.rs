//! W3C Trace Context propagation.
//!
//! # Responsibilities
//! - Parse an inbound `traceparent` header
//! - Derive the child context carried on the upstream call
//! - Mint a root context when the caller has none

/// Header name used for propagation.
pub const TRACEPARENT: &str = "traceparent";

/// A parsed `traceparent` value: `00-<trace-id>-<parent-id>-<flags>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
    parent_id: u64,
    flags: u8,
}

impl TraceContext {
    /// Parse a version-00 header. Invalid or all-zero ids yield `None`.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent_id = parts.next()?;
        let flags = parts.next()?;
        if parts.next().is_some() || version != "00" {
            return None;
        }
        if trace_id.len() != 32 || parent_id.len() != 16 || flags.len() != 2 {
            return None;
        }
        if ![trace_id, parent_id, flags].iter().all(|s| is_lower_hex(s)) {
            return None;
        }

        let trace_id = u128::from_str_radix(trace_id, 16).ok()?;
        let parent_id = u64::from_str_radix(parent_id, 16).ok()?;
        let flags = u8::from_str_radix(flags, 16).ok()?;
        if trace_id == 0 || parent_id == 0 {
            return None;
        }

        Some(Self {
            trace_id,
            parent_id,
            flags,
        })
    }

    /// A fresh, sampled root context.
    pub fn new_root() -> Self {
        Self {
            trace_id: non_zero_u128(),
            parent_id: non_zero_u64(),
            flags: 0x01,
        }
    }

    /// Same trace, new span id.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            parent_id: non_zero_u64(),
            flags: self.flags,
        }
    }

    pub fn trace_id(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    pub fn to_header(&self) -> String {
        format!("00-{:032x}-{:016x}-{:02x}", self.trace_id, self.parent_id, self.flags)
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn non_zero_u128() -> u128 {
    fastrand::u128(1..)
}

fn non_zero_u64() -> u64 {
    fastrand::u64(1..)
}
