//! Extension to MIME type lookup.

/// Looks up the MIME type for a file name, path, or bare extension.
///
/// Only the part after the last `.` or `/` is considered, so `"foo.js"`,
/// `"js"` and `"/static/app.js"` all resolve the same way.
///
/// # Examples
///
/// ```
/// use junction_http::mime_types::lookup;
///
/// assert_eq!(lookup("foo.js"), Some("application/javascript"));
/// assert_eq!(lookup("html"), Some("text/html"));
/// assert_eq!(lookup("rawr"), None);
/// ```
pub fn lookup(name: &str) -> Option<&'static str> {
    let ext = name
        .rsplit(['.', '/', '\\'])
        .next()
        .unwrap_or(name)
        .to_ascii_lowercase();

    let mime = match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "text" => "text/plain",
        "csv" => "text/csv",
        "md" | "markdown" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "bin" => "application/octet-stream",
        "form" | "urlencoded" => "application/x-www-form-urlencoded",
        _ => return None,
    };
    Some(mime)
}

/// Returns the default charset for a MIME type, if it has one.
///
/// Text types, JavaScript and JSON are UTF-8.
pub fn charset(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
    let utf8 = essence.starts_with("text/")
        || essence == "application/javascript"
        || essence == "application/json";
    utf8.then_some("utf-8")
}
