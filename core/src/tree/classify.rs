//! MIME-based classification of listed rows.

use crate::types::Kind;

/// MIME type the document tree reports for folders.
pub const DIRECTORY_MIME_TYPE: &str = "vnd.android.document/directory";

const IMAGE_PREFIX: &str = "image/";
const VIDEO_PREFIX: &str = "video/";

/// Map a row's MIME type onto a [`Kind`]. Rows that return `None` are dropped from listings.
///
/// Only the reported MIME type is consulted; the name is never inspected for an extension.
pub fn classify(_name: &str, mime_type: Option<&str>) -> Option<Kind> {
    let mime_type = mime_type?;
    if mime_type == DIRECTORY_MIME_TYPE {
        Some(Kind::Folder)
    } else if mime_type.starts_with(IMAGE_PREFIX) {
        Some(Kind::Image)
    } else if mime_type.starts_with(VIDEO_PREFIX) {
        Some(Kind::Video)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_mime_type() {
        assert_eq!(classify("Camera", Some(DIRECTORY_MIME_TYPE)), Some(Kind::Folder));
        assert_eq!(classify("a.jpg", Some("image/jpeg")), Some(Kind::Image));
        assert_eq!(classify("clip.mp4", Some("video/mp4")), Some(Kind::Video));
    }

    #[test]
    fn ignores_extension_and_unknown_types() {
        assert_eq!(classify("photo.jpg", Some("application/octet-stream")), None);
        assert_eq!(classify("photo.jpg", None), None);
        assert_eq!(classify("notes", Some("text/plain")), None);
        assert_eq!(classify("weird", Some("IMAGE/PNG")), None);
    }

    #[test]
    fn directory_sentinel_must_match_exactly() {
        assert_eq!(classify("x", Some("vnd.android.document/directory+extra")), None);
    }
}
