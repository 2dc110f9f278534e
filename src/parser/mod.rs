//! Line parser for the app-installation TSV format:
//! `dev_type \t dev_id \t lat \t lon \t app1,app2,...`

use thiserror::Error;

/// Number of tab-separated fields in a well-formed line.
pub const FIELD_COUNT: usize = 5;

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
pub struct AppsInstalled {
    pub dev_type: String,
    pub dev_id: String,
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<u32>,
}

impl AppsInstalled {
    /// Memcached key, `dev_type:dev_id`.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.dev_type, self.dev_id)
    }
}

/// Result of parsing one line: the event plus the number of app tokens dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub event: AppsInstalled,
    pub skipped_apps: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid line: expected 5 fields, got {0}")]
    InvalidLine(usize),

    #[error("empty device id")]
    EmptyDeviceId,

    #[error("invalid lat: {0:?}")]
    InvalidLat(String),

    #[error("invalid lon: {0:?}")]
    InvalidLon(String),
}

pub fn parse(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != FIELD_COUNT {
        return Err(ParseError::InvalidLine(parts.len()));
    }

    let dev_type = parts[0];
    let dev_id = parts[1];
    if dev_id.is_empty() {
        return Err(ParseError::EmptyDeviceId);
    }
    let lat: f64 = parts[2].parse().map_err(|_| ParseError::InvalidLat(parts[2].to_string()))?;
    let lon: f64 = parts[3].parse().map_err(|_| ParseError::InvalidLon(parts[3].to_string()))?;

    let mut apps = Vec::new();
    let mut skipped_apps = 0;
    for token in parts[4].split(',') {
        match token.trim().parse::<u32>() {
            Ok(app) => apps.push(app),
            Err(_) => {
                tracing::debug!(token, dev_id, "failed to parse app id");
                skipped_apps += 1;
            }
        }
    }

    Ok(ParsedLine {
        event: AppsInstalled { dev_type: dev_type.to_string(), dev_id: dev_id.to_string(), lat, lon, apps },
        skipped_apps,
    })
}
