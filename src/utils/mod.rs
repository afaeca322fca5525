use url::Url;

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Derives a filename from the final segment of the URL's path.
/// Returns `None` for unparseable URLs or paths with no usable segment.
pub fn filename_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    Some(sanitize_filename(segment))
}

/// Format a byte count as megabytes, matching the progress labels.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Format a bytes-per-second rate as KB/s.
pub fn format_kbps(bytes_per_sec: f64) -> String {
    format!("{:.2} KB/s", bytes_per_sec / 1024.0)
}
