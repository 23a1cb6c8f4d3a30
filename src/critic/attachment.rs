use base64::Engine as _;
use std::path::Path;

/// Normalize an image locator into a provider-acceptable inline form.
///
/// - Existing remote reference (`http://` / `https://`): passed through.
/// - Local file: read and base64-encoded with a sniffed media-type prefix.
/// - Empty, missing, or unreadable input: no attachment, never an error.
pub fn normalize(locator: Option<&str>) -> Option<String> {
    let locator = locator?.trim();
    if locator.is_empty() {
        return None;
    }

    if locator.starts_with("http://") || locator.starts_with("https://") {
        return Some(locator.to_string());
    }

    let path = Path::new(locator);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = locator, "attachment unreadable, skipping: {e}");
            return None;
        }
    };

    let media_type = infer::get(&bytes)
        .map_or("application/octet-stream", |kind| kind.mime_type());
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Some(format!("data:{media_type};base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn remote_references_pass_through() {
        let url = "https://cdn.example.com/artifact.png";
        assert_eq!(normalize(Some(url)).as_deref(), Some(url));
    }

    #[test]
    fn empty_and_missing_yield_no_attachment() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(Some("   ")), None);
        assert_eq!(normalize(Some("/no/such/file.png")), None);
    }

    #[test]
    fn local_png_is_inlined_with_media_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // Minimal PNG magic so the sniffer recognizes the type.
        file.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0])
            .unwrap();
        let inline = normalize(Some(file.path().to_str().unwrap())).unwrap();
        assert!(inline.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an image at all").unwrap();
        let inline = normalize(Some(file.path().to_str().unwrap())).unwrap();
        assert!(inline.starts_with("data:application/octet-stream;base64,"));
    }
}
