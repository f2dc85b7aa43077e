//! Tour file serialization and deserialization.
//!
//! The persisted form is the JSON encoding of [`TourFile`]. Decoding is
//! two-staged so malformed text and structurally invalid documents fail
//! distinctly; semantic problems (a stop referencing an unbound repository)
//! are left for `check` to report.

use serde_json::Value;
use waymark_api::{TourFile, SCHEMA_VERSION};

use crate::{Error, Result};

/// Encode a tour as pretty-printed JSON.
///
/// # Errors
///
/// Fails when the JSON layer rejects the aggregate; this does not happen
/// for values this crate constructs.
pub fn to_json(tour: &TourFile) -> Result<String> {
    serde_json::to_string_pretty(tour).map_err(|source| Error::MalformedJson { source })
}

/// Decode a tour from JSON text.
///
/// Unknown fields are tolerated for forward compatibility, but a schema tag
/// newer than this library understands is rejected outright. The stop-id
/// counter is raised above every existing stop id so files written by older
/// writers can never mint a duplicate id.
///
/// # Errors
///
/// Fails with [`Error::MalformedJson`] when the text is not JSON, with
/// [`Error::UnsupportedSchema`] when the schema tag is newer than
/// [`SCHEMA_VERSION`], and with [`Error::InvalidTourFile`] when the document
/// does not have the tour file structure.
pub fn from_json(text: &str) -> Result<TourFile> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| Error::MalformedJson { source })?;

    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        if version > u64::from(SCHEMA_VERSION) {
            return Err(Error::UnsupportedSchema {
                version: u32::try_from(version).unwrap_or(u32::MAX),
                supported: SCHEMA_VERSION,
            });
        }
    }

    let mut tour: TourFile =
        serde_json::from_value(value).map_err(|source| Error::InvalidTourFile { source })?;

    let max_id = tour.stops.iter().map(|stop| stop.id).max().unwrap_or(0);
    if tour.next_stop_id <= max_id {
        tour.next_stop_id = max_id + 1;
    }
    Ok(tour)
}
