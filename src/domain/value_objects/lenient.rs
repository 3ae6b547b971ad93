//! Decoders for upstream fields that arrive as strings, numbers or null.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s = string(d)?;
    Ok(if s.trim().is_empty() { None } else { Some(s.trim().to_string()) })
}

/// Missing, zero or garbled quantities count as one unit.
pub fn quantity<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as u64),
        _ => None,
    };
    Ok(n.and_then(|n| u32::try_from(n).ok()).unwrap_or(1).max(1))
}

pub fn decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    let raw = match Value::deserialize(d)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', "."),
        _ => return Ok(Decimal::ZERO),
    };
    Ok(Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).unwrap_or(Decimal::ZERO))
}

pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "on" | "yes"),
        _ => false,
    })
}

pub fn one() -> u32 { 1 }
