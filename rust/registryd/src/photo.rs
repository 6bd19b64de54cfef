/// Turns a stored photo path (as the backend saved it, often with Windows
/// separators) into a URL under the backend's static-asset origin.
///
/// Returns `None` when there is no photo.
pub fn photo_url(origin: &str, raw_path: Option<&str>) -> Option<String> {
    let path = raw_path?.trim();
    if path.is_empty() {
        return None;
    }
    let normalized = path.replace('\\', "/");
    Some(format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        normalized.trim_start_matches('/')
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_backslash() {
        assert_eq!(
            photo_url("http://localhost:5000", Some("uploads\\students\\ana.jpg")).as_deref(),
            Some("http://localhost:5000/uploads/students/ana.jpg")
        );
    }

    #[test]
    fn joins_with_single_slash() {
        assert_eq!(
            photo_url("http://localhost:5000/", Some("/uploads/a.png")).as_deref(),
            Some("http://localhost:5000/uploads/a.png")
        );
    }

    #[test]
    fn missing_or_blank_path_has_no_url() {
        assert_eq!(photo_url("http://localhost:5000", None), None);
        assert_eq!(photo_url("http://localhost:5000", Some("  ")), None);
    }
}
