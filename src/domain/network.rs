// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Range Value Object with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("IPv6 address pools are not supported: {0}")]
    Ipv6Unsupported(String),

    #[error("Range start {start} is above range end {end}")]
    InvertedRange { start: Ipv4Addr, end: Ipv4Addr },

    #[error("Range of {len} addresses exceeds the limit of {max}")]
    RangeTooLarge { len: u64, max: u64 },
}

fn parse_v4(raw: &str) -> Result<Ipv4Addr, NetworkError> {
    match IpAddr::from_str(raw.trim()) {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(NetworkError::Ipv6Unsupported(raw.to_string())),
        Err(_) => Err(NetworkError::InvalidIpAddress(raw.to_string())),
    }
}

/// Inclusive IPv4 address range
///
/// Invariants:
/// - Both ends are IPv4
/// - `start <= end`
///
/// # Examples
///
/// ```rust
/// use cim_inventory::domain::AddressRange;
///
/// let range = AddressRange::new("10.0.0.1", "10.0.0.4").unwrap();
/// assert_eq!(range.len(), 4);
///
/// let block: AddressRange = "192.168.1.0/30".parse().unwrap();
/// assert_eq!(block.to_string(), "192.168.1.0-192.168.1.3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl AddressRange {
    /// Create a range from its two inclusive ends
    pub fn new(start: impl AsRef<str>, end: impl AsRef<str>) -> Result<Self, NetworkError> {
        let start = parse_v4(start.as_ref())?;
        let end = parse_v4(end.as_ref())?;
        Self::from_bounds(start, end)
    }

    /// Create from already-parsed bounds
    pub fn from_bounds(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, NetworkError> {
        if start > end {
            return Err(NetworkError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Every address of a CIDR block, e.g. `10.0.0.0/30`
    pub fn from_cidr(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = parse_v4(addr_str)?;
        let prefix_length = prefix_str
            .trim()
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        let mask = if prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_length)
        };
        let network = u32::from(address) & mask;
        let broadcast = network | !mask;

        Ok(Self {
            start: Ipv4Addr::from(network),
            end: Ipv4Addr::from(broadcast),
        })
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Number of addresses in the range
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    /// A valid range always holds at least one address
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.start <= address && address <= self.end
    }

    /// Ascending iterator over the range
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }

    /// Reject ranges larger than `max` addresses
    pub fn ensure_at_most(&self, max: u64) -> Result<(), NetworkError> {
        if self.len() > max {
            return Err(NetworkError::RangeTooLarge {
                len: self.len(),
                max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for AddressRange {
    type Err = NetworkError;

    /// Accepts `a.b.c.d/len`, `start-end`, or a single address
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            Self::from_cidr(s)
        } else if let Some((start, end)) = s.split_once('-') {
            Self::new(start, end)
        } else {
            let single = parse_v4(s)?;
            Self::from_bounds(single, single)
        }
    }
}
