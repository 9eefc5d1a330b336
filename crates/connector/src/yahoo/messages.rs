//! Yahoo Finance streamer frame decoding
//!
//! Frames carry a base64 protobuf `PricingData`, either bare or wrapped in a
//! JSON envelope `{"type": "pricing", "message": "<base64>"}`. Decoded records
//! follow proto3 JSON conventions: snake_case keys, default values omitted,
//! enums rendered by name.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message as _;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::encoder::{widen_f32, RawRecord};

#[derive(Error, Debug)]
pub enum YahooDecodeError {
    #[error("invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

#[derive(Debug, Deserialize)]
struct PricingEnvelope {
    #[serde(rename = "type", default)]
    msg_type: Option<String>,
    message: String,
}

/// Quote update pushed by the streamer
#[derive(Clone, PartialEq, prost::Message)]
pub struct PricingData {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(float, tag = "2")]
    pub price: f32,
    #[prost(sint64, tag = "3")]
    pub time: i64,
    #[prost(string, tag = "4")]
    pub currency: String,
    #[prost(string, tag = "5")]
    pub exchange: String,
    #[prost(int32, tag = "6")]
    pub quote_type: i32,
    #[prost(int32, tag = "7")]
    pub market_hours: i32,
    #[prost(float, tag = "8")]
    pub change_percent: f32,
    #[prost(sint64, tag = "9")]
    pub day_volume: i64,
    #[prost(float, tag = "10")]
    pub day_high: f32,
    #[prost(float, tag = "11")]
    pub day_low: f32,
    #[prost(float, tag = "12")]
    pub change: f32,
    #[prost(string, tag = "13")]
    pub short_name: String,
    #[prost(sint64, tag = "14")]
    pub expire_date: i64,
    #[prost(float, tag = "15")]
    pub open_price: f32,
    #[prost(float, tag = "16")]
    pub previous_close: f32,
    #[prost(float, tag = "17")]
    pub strike_price: f32,
    #[prost(string, tag = "18")]
    pub underlying_symbol: String,
    #[prost(sint64, tag = "19")]
    pub open_interest: i64,
    #[prost(int32, tag = "20")]
    pub options_type: i32,
    #[prost(sint64, tag = "21")]
    pub mini_option: i64,
    #[prost(sint64, tag = "22")]
    pub last_size: i64,
    #[prost(float, tag = "23")]
    pub bid: f32,
    #[prost(sint64, tag = "24")]
    pub bid_size: i64,
    #[prost(float, tag = "25")]
    pub ask: f32,
    #[prost(sint64, tag = "26")]
    pub ask_size: i64,
    #[prost(sint64, tag = "27")]
    pub price_hint: i64,
    #[prost(sint64, tag = "28")]
    pub vol_24hr: i64,
    #[prost(sint64, tag = "29")]
    pub vol_all_currencies: i64,
    #[prost(string, tag = "30")]
    pub from_currency: String,
    #[prost(string, tag = "31")]
    pub last_market: String,
    #[prost(double, tag = "32")]
    pub circulating_supply: f64,
    #[prost(double, tag = "33")]
    pub market_cap: f64,
}

fn quote_type_name(value: i32) -> Option<&'static str> {
    Some(match value {
        5 => "ALTSYMBOL",
        7 => "HEARTBEAT",
        8 => "EQUITY",
        9 => "INDEX",
        11 => "MUTUALFUND",
        12 => "MONEYMARKET",
        13 => "OPTION",
        14 => "CURRENCY",
        15 => "WARRANT",
        17 => "BOND",
        18 => "FUTURE",
        20 => "ETF",
        23 => "COMMODITY",
        28 => "ECNQUOTE",
        41 => "CRYPTOCURRENCY",
        42 => "INDICATOR",
        1000 => "INDUSTRY",
        _ => return None,
    })
}

fn market_hours_name(value: i32) -> Option<&'static str> {
    Some(match value {
        1 => "REGULAR_MARKET",
        2 => "POST_MARKET",
        3 => "EXTENDED_HOURS_MARKET",
        _ => return None,
    })
}

fn options_type_name(value: i32) -> Option<&'static str> {
    match value {
        1 => Some("PUT"),
        _ => None,
    }
}

struct RecordBuilder(RawRecord);

impl RecordBuilder {
    fn string(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.0.insert(key.to_string(), Value::String(value.to_string()));
        }
        self
    }

    fn float(&mut self, key: &str, value: f32) -> &mut Self {
        if value != 0.0 {
            if let Some(n) = serde_json::Number::from_f64(widen_f32(value)) {
                self.0.insert(key.to_string(), Value::Number(n));
            }
        }
        self
    }

    fn double(&mut self, key: &str, value: f64) -> &mut Self {
        if value != 0.0 {
            if let Some(n) = serde_json::Number::from_f64(value) {
                self.0.insert(key.to_string(), Value::Number(n));
            }
        }
        self
    }

    fn long(&mut self, key: &str, value: i64) -> &mut Self {
        if value != 0 {
            self.0.insert(key.to_string(), Value::from(value));
        }
        self
    }

    /// Known enum values by name, unknown ones as their number
    fn enumeration(&mut self, key: &str, value: i32, name: fn(i32) -> Option<&'static str>) -> &mut Self {
        if value != 0 {
            let rendered = match name(value) {
                Some(name) => Value::String(name.to_string()),
                None => Value::from(value),
            };
            self.0.insert(key.to_string(), rendered);
        }
        self
    }
}

impl PricingData {
    /// Render as a key -> value record
    pub fn to_record(&self) -> RawRecord {
        let mut builder = RecordBuilder(RawRecord::new());
        builder
            .string("id", &self.id)
            .float("price", self.price)
            .long("time", self.time)
            .string("currency", &self.currency)
            .string("exchange", &self.exchange)
            .enumeration("quote_type", self.quote_type, quote_type_name)
            .enumeration("market_hours", self.market_hours, market_hours_name)
            .float("change_percent", self.change_percent)
            .long("day_volume", self.day_volume)
            .float("day_high", self.day_high)
            .float("day_low", self.day_low)
            .float("change", self.change)
            .string("short_name", &self.short_name)
            .long("expire_date", self.expire_date)
            .float("open_price", self.open_price)
            .float("previous_close", self.previous_close)
            .float("strike_price", self.strike_price)
            .string("underlying_symbol", &self.underlying_symbol)
            .long("open_interest", self.open_interest)
            .enumeration("options_type", self.options_type, options_type_name)
            .long("mini_option", self.mini_option)
            .long("last_size", self.last_size)
            .float("bid", self.bid)
            .long("bid_size", self.bid_size)
            .float("ask", self.ask)
            .long("ask_size", self.ask_size)
            .long("price_hint", self.price_hint)
            .long("vol_24hr", self.vol_24hr)
            .long("vol_all_currencies", self.vol_all_currencies)
            .string("from_currency", &self.from_currency)
            .string("last_market", &self.last_market)
            .double("circulating_supply", self.circulating_supply)
            .double("market_cap", self.market_cap);
        builder.0
    }
}

/// Decode one text frame from the streamer
pub fn decode_frame(text: &str) -> Result<PricingData, YahooDecodeError> {
    let text = text.trim();
    let payload = if text.starts_with('{') {
        let envelope: PricingEnvelope = serde_json::from_str(text)?;
        match envelope.msg_type.as_deref() {
            None | Some("pricing") => envelope.message,
            Some(other) => return Err(YahooDecodeError::UnsupportedType(other.to_string())),
        }
    } else {
        text.to_string()
    };

    let bytes = STANDARD.decode(payload.trim())?;
    Ok(PricingData::decode(bytes.as_slice())?)
}
