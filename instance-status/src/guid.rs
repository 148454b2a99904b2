//! Compound process-group ids.
//!
//! A process guid is two uuids joined by a dash: the application id and the
//! application version (73 chars total). Orchestrator label values cannot
//! hold that, so the selector uses a shortened encoding with the uuids
//! rendered dashless (65 chars total). For canonical lowercase ids the two
//! encodings are exact inverses of each other.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

const LONG_UUID_LEN: usize = 36;
const SHORT_UUID_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed process guid")]
pub struct GuidError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessGuid {
    app_guid: Uuid,
    app_version: Uuid,
}

impl ProcessGuid {
    pub fn new(app_guid: Uuid, app_version: Uuid) -> Self {
        Self {
            app_guid,
            app_version,
        }
    }

    /// Parses the full `<uuid>-<uuid>` form, hyphenated halves only.
    pub fn parse(guid: &str) -> Result<Self, GuidError> {
        let (app_guid, app_version) = split_halves(guid, LONG_UUID_LEN)?;
        Ok(Self {
            app_guid,
            app_version,
        })
    }

    /// Parses the shortened `<simple>-<simple>` form used in selector labels.
    pub fn decode(shortened: &str) -> Result<Self, GuidError> {
        let (app_guid, app_version) = split_halves(shortened, SHORT_UUID_LEN)?;
        Ok(Self {
            app_guid,
            app_version,
        })
    }

    /// The 65-char selector encoding: both uuids dashless, dash-joined.
    pub fn shortened(&self) -> String {
        format!("{}-{}", self.app_guid.simple(), self.app_version.simple())
    }
}

impl fmt::Display for ProcessGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.app_guid.hyphenated(),
            self.app_version.hyphenated()
        )
    }
}

// Uuid::try_parse picks the rendering by length, so constraining each half
// to a fixed length keeps the two forms from being accepted interchangeably.
fn split_halves(joined: &str, half_len: usize) -> Result<(Uuid, Uuid), GuidError> {
    if joined.len() != half_len * 2 + 1 || !joined.is_ascii() {
        return Err(GuidError);
    }
    if joined.as_bytes()[half_len] != b'-' {
        return Err(GuidError);
    }
    let first = Uuid::try_parse(&joined[..half_len]).map_err(|_| GuidError)?;
    let second = Uuid::try_parse(&joined[half_len + 1..]).map_err(|_| GuidError)?;
    Ok((first, second))
}
