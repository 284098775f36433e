//! Market data message model: enum mappings and the decoded message value.
//!
//! The integer discriminants below mirror the native header's enum
//! declaration order (0-based) and must stay byte-identical to it; a
//! mismatch silently corrupts every crawl call. [`MarketType::ALL`] and
//! [`MessageType::ALL`] exist so tests can assert full coverage of the
//! closed sets.

use crate::error::{CrawlerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument category, coded as in the native header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MarketType {
    Spot = 0,
    LinearFuture = 1,
    InverseFuture = 2,
    LinearSwap = 3,
    InverseSwap = 4,
    AmericanOption = 5,
    EuropeanOption = 6,
    QuantoFuture = 7,
    QuantoSwap = 8,
    Move = 9,
    Bvol = 10,
}

impl MarketType {
    /// Every member of the closed set, in code order.
    pub const ALL: [MarketType; 11] = [
        MarketType::Spot,
        MarketType::LinearFuture,
        MarketType::InverseFuture,
        MarketType::LinearSwap,
        MarketType::InverseSwap,
        MarketType::AmericanOption,
        MarketType::EuropeanOption,
        MarketType::QuantoFuture,
        MarketType::QuantoSwap,
        MarketType::Move,
        MarketType::Bvol,
    ];

    /// Integer code passed over the ABI.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decode an ABI code, failing on anything outside the closed set.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(MarketType::Spot),
            1 => Ok(MarketType::LinearFuture),
            2 => Ok(MarketType::InverseFuture),
            3 => Ok(MarketType::LinearSwap),
            4 => Ok(MarketType::InverseSwap),
            5 => Ok(MarketType::AmericanOption),
            6 => Ok(MarketType::EuropeanOption),
            7 => Ok(MarketType::QuantoFuture),
            8 => Ok(MarketType::QuantoSwap),
            9 => Ok(MarketType::Move),
            10 => Ok(MarketType::Bvol),
            _ => Err(CrawlerError::UnknownEnumValue { kind: "market type", code }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::LinearFuture => "linear_future",
            MarketType::InverseFuture => "inverse_future",
            MarketType::LinearSwap => "linear_swap",
            MarketType::InverseSwap => "inverse_swap",
            MarketType::AmericanOption => "american_option",
            MarketType::EuropeanOption => "european_option",
            MarketType::QuantoFuture => "quanto_future",
            MarketType::QuantoSwap => "quanto_swap",
            MarketType::Move => "move",
            MarketType::Bvol => "bvol",
        }
    }
}

impl TryFrom<u32> for MarketType {
    type Error = CrawlerError;

    fn try_from(code: u32) -> Result<Self> {
        MarketType::from_code(code)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        MarketType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CrawlerError::InvalidArgument(format!("unknown market type: {s:?}")))
    }
}

/// Kind of market-data event, coded as in the native header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MessageType {
    Trade = 0,
    L2Event = 1,
    L2Snapshot = 2,
    L3Event = 3,
    L3Snapshot = 4,
    Bbo = 5,
    Ticker = 6,
    Candlestick = 7,
    FundingRate = 8,
}

impl MessageType {
    /// Every member of the closed set, in code order.
    pub const ALL: [MessageType; 9] = [
        MessageType::Trade,
        MessageType::L2Event,
        MessageType::L2Snapshot,
        MessageType::L3Event,
        MessageType::L3Snapshot,
        MessageType::Bbo,
        MessageType::Ticker,
        MessageType::Candlestick,
        MessageType::FundingRate,
    ];

    /// Integer code passed over the ABI.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decode an ABI code, failing on anything outside the closed set.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(MessageType::Trade),
            1 => Ok(MessageType::L2Event),
            2 => Ok(MessageType::L2Snapshot),
            3 => Ok(MessageType::L3Event),
            4 => Ok(MessageType::L3Snapshot),
            5 => Ok(MessageType::Bbo),
            6 => Ok(MessageType::Ticker),
            7 => Ok(MessageType::Candlestick),
            8 => Ok(MessageType::FundingRate),
            _ => Err(CrawlerError::UnknownEnumValue { kind: "message type", code }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Trade => "trade",
            MessageType::L2Event => "l2_event",
            MessageType::L2Snapshot => "l2_snapshot",
            MessageType::L3Event => "l3_event",
            MessageType::L3Snapshot => "l3_snapshot",
            MessageType::Bbo => "bbo",
            MessageType::Ticker => "ticker",
            MessageType::Candlestick => "candlestick",
            MessageType::FundingRate => "funding_rate",
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = CrawlerError;

    fn try_from(code: u32) -> Result<Self> {
        MessageType::from_code(code)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        MessageType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CrawlerError::InvalidArgument(format!("unknown message type: {s:?}")))
    }
}

/// One market-data event, decoded once from the native record and handed to
/// the caller's handler. Never mutated or retained by the binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub exchange: String,
    pub market_type: MarketType,
    pub msg_type: MessageType,
    /// `None` when the native record carries no symbol (snapshot-style
    /// operations may emit per-exchange messages without one).
    pub symbol: Option<String>,
    /// Milliseconds since the Unix epoch, stamped by the native crawler.
    pub received_at: u64,
    /// Serialized event payload, forwarded byte-for-byte. Never parsed or
    /// validated by the binding.
    pub json: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_type_codes_round_trip() {
        for mt in MarketType::ALL {
            assert_eq!(MarketType::from_code(mt.code()).unwrap(), mt);
        }
    }

    #[test]
    fn message_type_codes_round_trip() {
        for mt in MessageType::ALL {
            assert_eq!(MessageType::from_code(mt.code()).unwrap(), mt);
        }
    }

    #[test]
    fn codes_match_native_header_order() {
        // Pinned against the header; a renumbering here is an ABI break.
        assert_eq!(MarketType::Spot.code(), 0);
        assert_eq!(MarketType::InverseSwap.code(), 4);
        assert_eq!(MarketType::Bvol.code(), 10);
        assert_eq!(MessageType::Trade.code(), 0);
        assert_eq!(MessageType::L3Snapshot.code(), 4);
        assert_eq!(MessageType::FundingRate.code(), 8);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let err = MarketType::from_code(11).unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::UnknownEnumValue { kind: "market type", code: 11 }
        ));
        let err = MessageType::from_code(9).unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::UnknownEnumValue { kind: "message type", code: 9 }
        ));
    }

    #[test]
    fn names_round_trip() {
        for mt in MarketType::ALL {
            assert_eq!(mt.as_str().parse::<MarketType>().unwrap(), mt);
        }
        for mt in MessageType::ALL {
            assert_eq!(mt.as_str().parse::<MessageType>().unwrap(), mt);
        }
        assert!("perpetual".parse::<MarketType>().is_err());
    }

    #[test]
    fn message_displays_as_json() {
        let msg = Message {
            exchange: "binance".to_string(),
            market_type: MarketType::Spot,
            msg_type: MessageType::Trade,
            symbol: Some("BTCUSDT".to_string()),
            received_at: 1_625_097_600_000,
            json: r#"{"price":100}"#.to_string(),
        };
        let text = msg.to_string();
        assert!(text.contains(r#""exchange":"binance""#));
        assert!(text.contains(r#""market_type":"spot""#));
        assert!(text.contains(r#""msg_type":"trade""#));
    }
}
