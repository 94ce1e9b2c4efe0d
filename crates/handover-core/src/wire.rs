//! Serde helpers for the loosely-typed values the backends exchange.
//!
//! Query rows come out of heterogeneous sources: the same column may arrive
//! as a JSON number from one backend and as a string from another, and flags
//! arrive as booleans, `0`/`1`, or `"True"`. Action payloads in turn expect
//! flags spelled the way each backend spells them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

// ─── Deserializers ────────────────────────────────────────────────────────────

/// Accept `true`, `1`, `"1"`, `"true"`, `"yes"` (any case) as `true`.
pub fn flexible_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
  match Option::<Loose>::deserialize(d)? {
    None => Ok(false),
    Some(Loose::Bool(b)) => Ok(b),
    Some(Loose::Int(i)) => Ok(i != 0),
    Some(Loose::Float(f)) => Ok(f != 0.0),
    Some(Loose::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" => Ok(true),
      "" | "0" | "false" | "no" => Ok(false),
      other => Err(de::Error::custom(format!("not a flag: {other:?}"))),
    },
  }
}

/// Accept a string or a number and keep its textual form.
pub fn flexible_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  match Loose::deserialize(d)? {
    Loose::Text(s) => Ok(s),
    Loose::Int(i) => Ok(i.to_string()),
    Loose::Float(f) => Ok(f.to_string()),
    Loose::Bool(b) => Ok(b.to_string()),
  }
}

/// Accept an integer or a numeric string.
pub fn flexible_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
  match Loose::deserialize(d)? {
    Loose::Int(i) => Ok(i),
    Loose::Text(s) => s
      .trim()
      .parse()
      .map_err(|_| de::Error::custom(format!("not an integer: {s:?}"))),
    Loose::Float(f) if f.fract() == 0.0 => Ok(f as i64),
    _ => Err(de::Error::custom("expected an integer")),
  }
}

/// Like [`flexible_i64`] but a missing or null value becomes `None`.
pub fn flexible_opt_i64<'de, D: Deserializer<'de>>(
  d: D,
) -> Result<Option<i64>, D::Error> {
  match Option::<Loose>::deserialize(d)? {
    None => Ok(None),
    Some(Loose::Int(i)) => Ok(Some(i)),
    Some(Loose::Text(s)) if s.trim().is_empty() => Ok(None),
    Some(Loose::Text(s)) => s
      .trim()
      .parse()
      .map(Some)
      .map_err(|_| de::Error::custom(format!("not an integer: {s:?}"))),
    Some(Loose::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
    Some(_) => Err(de::Error::custom("expected an integer")),
  }
}

// ─── Serializers ──────────────────────────────────────────────────────────────

/// `"True"` / `"False"`, as the call manager expects.
pub fn title_bool<S: Serializer>(b: &bool, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(if *b { "True" } else { "False" })
}

/// `"true"` / `"false"`, as the voicemail system expects.
pub fn lower_bool<S: Serializer>(b: &bool, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(if *b { "true" } else { "false" })
}

/// `"1"` / `"0"`, as the audit table stores flags.
pub fn digit_bool<S: Serializer>(b: &bool, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(if *b { "1" } else { "0" })
}

// ─── Audit timestamps ────────────────────────────────────────────────────────

/// `YYYY-MM-DD HH:MM:SS.mmm` in UTC. Reads RFC 3339 as well.
pub mod audit_timestamp {
  use super::*;

  const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

  pub fn format(dt: &DateTime<Utc>) -> String { dt.format(FORMAT).to_string() }

  pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, FORMAT)
      .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
      .ok()
      .map(|naive| naive.and_utc())
  }

  pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format(dt))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("bad timestamp: {raw:?}")))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize)]
  struct Flags {
    #[serde(deserialize_with = "flexible_bool", default)]
    on:    bool,
    #[serde(deserialize_with = "flexible_string")]
    index: String,
  }

  #[test]
  fn flags_accept_backend_spellings() {
    for raw in [r#"{"on":true,"index":1}"#, r#"{"on":"True","index":"1"}"#, r#"{"on":1,"index":1}"#] {
      let flags: Flags = serde_json::from_str(raw).unwrap();
      assert!(flags.on, "{raw}");
      assert_eq!(flags.index, "1");
    }
    let flags: Flags = serde_json::from_str(r#"{"on":null,"index":"2"}"#).unwrap();
    assert!(!flags.on);
  }

  #[test]
  fn audit_timestamp_uses_millisecond_format() {
    let dt = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
    assert_eq!(audit_timestamp::format(&dt), "2024-03-07 09:05:01.000");
    assert_eq!(audit_timestamp::parse("2024-03-07 09:05:01.000"), Some(dt));
    assert_eq!(audit_timestamp::parse("2024-03-07T09:05:01Z"), Some(dt));
  }
}
