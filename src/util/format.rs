use std::time::Duration;

/// Format a Unix timestamp as YYYY-MM-DD HH:MM string (UTC)
pub fn format_timestamp(timestamp: i64) -> String {
    use time::OffsetDateTime;
    use time::macros::format_description;

    if timestamp == 0 {
        return "never".to_string();
    }

    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| {
            let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
            dt.format(&format).ok()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Format a duration with a unit fitting its magnitude
pub fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    if micros >= 1_000_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else if micros >= 1_000 {
        format!("{:.1}ms", micros as f64 / 1_000.0)
    } else {
        format!("{}µs", micros)
    }
}

/// First 12 characters of a commit ID, or `(root)` for the sentinel
pub fn short_commit(commit: &str) -> &str {
    if commit.is_empty() {
        return "(root)";
    }
    &commit[..commit.len().min(12)]
}
