use chrono::{DateTime, SecondsFormat, Utc};

/// Current instant as an RFC 3339 string, millisecond precision.
pub fn now_rfc3339() -> String {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
