//! 32-byte identifiers for requests, request keys and proposals.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! hash_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Parse a 64-character hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypesError> {
                hex::decode_32(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(&self.0))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

hash_type!(
    /// Unique identifier of a single submitted request.
    ///
    /// Also doubles as the lease value a voter must attach to its ticket.
    RequestId
);

hash_type!(
    /// `H(requester ‖ key)`: the registry key of a requester's live request.
    KeyHash
);

hash_type!(
    /// Content hash of a proposed answer plus its destination.
    VoteHash
);

// Inline hex helpers so this crate stays free of an encoding dependency.
pub(crate) mod hex {
    use crate::error::TypesError;

    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode_32(s: &str) -> Result<[u8; 32], TypesError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(TypesError::InvalidLength {
                expected: 32,
                got: s.len() / 2,
            });
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| TypesError::InvalidHex(s.into()))?;
            out[i] = u8::from_str_radix(pair, 16).map_err(|_| TypesError::InvalidHex(s.into()))?;
        }
        Ok(out)
    }
}
