use image::ImageFormat;

/// Content type used for anything that isn't a recognised image.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Signatures `image` doesn't know about.
///
/// Each entry is `(offset, magic, content type)`.
const EXTRA_SIGNATURES: &[(usize, &[u8], &str)] = &[
    (4, b"ftypheic", "image/heif"),
    (4, b"ftypheix", "image/heif"),
    (4, b"ftypmif1", "image/heif"),
    (4, b"ftypavif", "image/avif"),
    (0, b"\x00\x00\x00\x0cjP  ", "image/jp2"),
];

/// Guesses the content type of an encoded image from its leading bytes.
///
/// Unknown or empty buffers are labelled `application/octet-stream`.
pub fn guess_content_type(buff: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(buff) {
        if let Some(content_type) = content_type_of(format) {
            return content_type;
        }
    }

    for (offset, magic, content_type) in EXTRA_SIGNATURES {
        let end = offset + magic.len();
        if buff.len() >= end && &buff[*offset..end] == *magic {
            return *content_type;
        }
    }

    if is_svg(buff) {
        return "image/svg+xml";
    }

    OCTET_STREAM
}

fn content_type_of(format: ImageFormat) -> Option<&'static str> {
    let content_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Avif => "image/avif",
        ImageFormat::Pnm => "image/x-portable-anymap",
        ImageFormat::Hdr => "image/vnd.radiance",
        ImageFormat::OpenExr => "image/x-exr",
        ImageFormat::Dds => "image/vnd-ms.dds",
        ImageFormat::Farbfeld => "image/x-farbfeld",
        _ => return None,
    };

    Some(content_type)
}

fn is_svg(buff: &[u8]) -> bool {
    // Only sniff the head of the document, an svg root is never far in.
    let head = &buff[..buff.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();

    (text.starts_with("<?xml") || text.starts_with("<svg") || text.starts_with("<!DOCTYPE svg"))
        && text.contains("<svg")
}
