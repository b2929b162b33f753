use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::warn;

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Reads the primary image `DateTime` tag.
///
/// Returns `Ok(None)` if the file carries no EXIF block or no parsable
/// date; only failing to open the file is an error.
pub(super) fn read_datetime(path: &Path) -> std::io::Result<Option<NaiveDateTime>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let data = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no exif data");
            return Ok(None);
        }
    };
    let Some(field) = data.get_field(exif::Tag::DateTime, exif::In::PRIMARY) else {
        warn!(path = %path.display(), "exif data without DateTime");
        return Ok(None);
    };
    let raw = match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string()),
        _ => None,
    };
    Ok(raw.and_then(|raw| parse_exif_date(&raw)))
}

fn parse_exif_date(raw: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(raw, EXIF_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(value = raw, error = %e, "unparsable exif DateTime");
            None
        }
    }
}
