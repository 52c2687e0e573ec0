//! Serialized session state.
//!
//! On-disk format (`state.json`):
//!
//! ```json
//! {
//!   "session_start": 1700000000.25,
//!   "running": true,
//!   "last_shutdown": 1699990000.0,
//!   "last_online_duration": 5400.5
//! }
//! ```
//!
//! Older writers stored numbers as strings, so numeric fields accept either a
//! JSON number or a numeric string. Anything else fails the whole snapshot.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionState {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub session_start: Option<f64>,
    #[serde(default)]
    pub running: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_shutdown: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_online_duration: Option<f64>,
}

impl SessionState {
    /// A fresh session starting at `now`, carrying the previous session's
    /// shutdown bookkeeping forward.
    pub fn begin(now: f64, previous: &SessionState) -> Self {
        SessionState {
            session_start: Some(now),
            running: true,
            last_shutdown: previous.last_shutdown,
            last_online_duration: previous.last_online_duration,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<NumberOrText>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrText::Number(value)) => value,
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", text)))?,
    };

    if !value.is_finite() {
        return Err(D::Error::custom("timestamp is not finite"));
    }
    Ok(Some(value))
}
