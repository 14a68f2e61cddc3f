//! Identifier and value types shared by every XFarm component.
//!
//! All amounts are `u128` base units, all heights `u64`. Tables refer to
//! each other only through these identifiers, never through references.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{DEFAULT_UNLOCK_RATIO, NORMAL_STREAM_PERIOD, VOTING_STREAM_PERIOD};

/// Token amount in base units.
pub type Amount = u128;

/// Externally supplied, monotonically increasing step counter.
pub type Height = u64;

/// A participant or contract account on the asset ledger.
///
/// Parses from 64 hex characters, or from any other label by hashing it
/// with BLAKE3, so `"alice".parse()` and `AccountId::derive(b"alice")` agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, bincode::Encode, bincode::Decode)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The reserved zero account. Never a valid stream recipient.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Largest account id; upper bound for range scans keyed by account.
    pub const MAX: Self = Self([0xffu8; 32]);

    /// Derive a deterministic account id from a label.
    pub fn derive(label: &[u8]) -> Self {
        Self(*blake3::hash(label).as_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// A fungible asset (reward token or stakeable asset).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, bincode::Encode, bincode::Decode)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    /// Derive a deterministic asset id from a label.
    pub fn derive(label: &[u8]) -> Self {
        Self(*blake3::hash(label).as_bytes())
    }
}

fn parse_id(s: &str) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    if s.len() == 64 && hex::decode_to_slice(s, &mut bytes).is_ok() {
        return bytes;
    }
    *blake3::hash(s.as_bytes()).as_bytes()
}

impl FromStr for AccountId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_id(s)))
    }
}

impl FromStr for AssetId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_id(s)))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self(parse_id(&s)))
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self(parse_id(&s)))
    }
}

/// Serde adapter for [`Amount`] fields.
///
/// Serializes as a decimal string and accepts either a string or an integer,
/// since TOML and many JSON consumers cannot carry a full `u128`.
pub mod serde_amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::Amount;

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(v as Amount)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<Amount, E> {
                Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.replace('_', "")
                    .parse()
                    .map_err(|_| E::custom(format!("invalid amount {v:?}")))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Index of a pool in the pool table.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(transparent)]
pub struct PoolId(pub u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Identifier of a vesting stream. The first stream is 1.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Kind of reward stream a payout is routed to.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Long-period stream for rewards earned in the voting pool.
    Voting,
    /// Short-period stream for every other reward.
    Normal,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voting => f.write_str("voting"),
            Self::Normal => f.write_str("normal"),
        }
    }
}

/// Release parameters of a stream: unlock `unlock_ratio / RATIO_PRECISION`
/// of the remaining principal every `period` heights.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct StreamTerms {
    pub period: Height,
    pub unlock_ratio: u64,
}

impl StreamTerms {
    /// Default terms for the given stream kind.
    pub fn default_for(kind: StreamKind) -> Self {
        let period = match kind {
            StreamKind::Voting => VOTING_STREAM_PERIOD,
            StreamKind::Normal => NORMAL_STREAM_PERIOD,
        };
        Self {
            period,
            unlock_ratio: DEFAULT_UNLOCK_RATIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parse_matches_derive() {
        let parsed: AccountId = "alice".parse().unwrap();
        assert_eq!(parsed, AccountId::derive(b"alice"));
        assert_ne!(parsed, AccountId::derive(b"bob"));
    }

    #[test]
    fn hex_parse_round_trips_display() {
        let id = AccountId::derive(b"carol");
        let parsed: AccountId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn sixty_four_non_hex_chars_fall_back_to_label() {
        let label = "z".repeat(64);
        let parsed: AssetId = label.parse().unwrap();
        assert_eq!(parsed, AssetId::derive(label.as_bytes()));
    }

    #[test]
    fn zero_account() {
        assert!(AccountId::ZERO.is_zero());
        assert!(!AccountId::derive(b"x").is_zero());
        assert!(AccountId::ZERO < AccountId::MAX);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = AssetId::derive(b"lp");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_accepts_labels() {
        let id: AccountId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(id, AccountId::derive(b"bob"));
    }

    #[test]
    fn stream_kind_serde_lowercase() {
        assert_eq!(serde_json::to_string(&StreamKind::Voting).unwrap(), "\"voting\"");
        let k: StreamKind = serde_json::from_str("\"normal\"").unwrap();
        assert_eq!(k, StreamKind::Normal);
    }

    #[test]
    fn default_terms_per_kind() {
        let voting = StreamTerms::default_for(StreamKind::Voting);
        let normal = StreamTerms::default_for(StreamKind::Normal);
        assert_eq!(voting.period, VOTING_STREAM_PERIOD);
        assert_eq!(normal.period, NORMAL_STREAM_PERIOD);
        assert_eq!(voting.unlock_ratio, normal.unlock_ratio);
    }

    #[test]
    fn display_ids() {
        assert_eq!(PoolId(3).to_string(), "pool#3");
        assert_eq!(StreamId(7).to_string(), "stream#7");
        assert_eq!(StreamKind::Normal.to_string(), "normal");
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Wrapped {
        #[serde(with = "serde_amount")]
        amount: Amount,
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let w = Wrapped { amount: u128::MAX };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, format!("{{\"amount\":\"{}\"}}", u128::MAX));
        assert_eq!(serde_json::from_str::<Wrapped>(&json).unwrap(), w);
    }

    #[test]
    fn amounts_accept_integers_and_underscores() {
        let w: Wrapped = serde_json::from_str(r#"{"amount": 42}"#).unwrap();
        assert_eq!(w.amount, 42);
        let w: Wrapped = serde_json::from_str(r#"{"amount": "1_000"}"#).unwrap();
        assert_eq!(w.amount, 1_000);
        assert!(serde_json::from_str::<Wrapped>(r#"{"amount": -1}"#).is_err());
    }
}
