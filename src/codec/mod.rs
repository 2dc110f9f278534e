//! Protobuf payload stored in memcached.
//!
//! The message is declared by hand with `prost` derives instead of going
//! through `prost-build`; it mirrors:
//!
//! ```text
//! message UserApps {
//!     repeated uint32 apps = 1 [packed = true];
//!     optional double lat = 2;
//!     optional double lon = 3;
//! }
//! ```

use prost::Message;
use serde::Serialize;
use thiserror::Error;

use crate::parser::AppsInstalled;

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct UserApps {
    #[prost(uint32, repeated, packed = "true", tag = "1")]
    pub apps: Vec<u32>,
    #[prost(double, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[prost(double, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl From<&AppsInstalled> for UserApps {
    fn from(ev: &AppsInstalled) -> Self {
        Self { apps: ev.apps.clone(), lat: Some(ev.lat), lon: Some(ev.lon) }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("diagnostic render error: {0}")]
    Render(#[from] serde_json::Error),
}

pub fn encode(msg: &UserApps) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(msg.encoded_len());
    msg.encode(&mut buf)?;
    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<UserApps, CodecError> {
    Ok(UserApps::decode(bytes)?)
}

/// Human-readable form used by dry runs.
pub fn render_diagnostic(msg: &UserApps) -> Result<String, CodecError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(apps: Vec<u32>) -> AppsInstalled {
        AppsInstalled { dev_type: "idfa".into(), dev_id: "A42".into(), lat: 55.55, lon: 37.37, apps }
    }

    #[test]
    fn round_trip_preserves_fields_and_order() {
        let msg = UserApps::from(&event(vec![44, 42, 43, u32::MAX, 0]));
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.apps, vec![44, 42, 43, u32::MAX, 0]);
        assert_eq!(decoded.lat, Some(55.55));
        assert_eq!(decoded.lon, Some(37.37));
    }

    #[test]
    fn round_trip_empty_apps() {
        let msg = UserApps::from(&event(Vec::new()));
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert!(decoded.apps.is_empty());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trip_keeps_zero_coordinates() {
        let mut ev = event(vec![1]);
        ev.lat = 0.0;
        ev.lon = -0.0;
        let decoded = decode(&encode(&UserApps::from(&ev)).unwrap()).unwrap();
        assert_eq!(decoded.lat, Some(0.0));
        assert!(decoded.lon.unwrap().is_sign_negative());
    }

    #[test]
    fn diagnostic_is_json() {
        let msg = UserApps::from(&event(vec![1, 2]));
        let text = render_diagnostic(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["apps"], serde_json::json!([1, 2]));
        assert_eq!(value["lat"], serde_json::json!(55.55));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(decode(&[0xff, 0xff, 0xff]), Err(CodecError::Decode(_))));
    }
}
