/// Image container formats the result page knows how to embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// An Image in PNG Format
    Png,

    /// An Image in JPEG Format (covers .jpg, .jpeg and .jfif)
    Jpeg,

    /// An Image in GIF Format
    Gif,

    /// An Image in WEBP Format
    WebP,

    /// An Image in BMP Format
    Bmp,

    /// An Image in TIFF Format
    Tiff,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
        }
    }
}

// (signature, mask); an empty mask compares the signature verbatim
static MAGIC_BYTES: [(&[u8], &[u8], ImageFormat); 8] = [
    (b"\x89PNG\r\n\x1a\n", b"", ImageFormat::Png),
    (&[0xff, 0xd8, 0xff], b"", ImageFormat::Jpeg),
    (b"GIF89a", b"", ImageFormat::Gif),
    (b"GIF87a", b"", ImageFormat::Gif),
    (
        b"RIFF\0\0\0\0WEBP",
        b"\xFF\xFF\xFF\xFF\0\0\0\0\xFF\xFF\xFF\xFF",
        ImageFormat::WebP,
    ),
    (b"BM", b"", ImageFormat::Bmp),
    (b"MM\x00*", b"", ImageFormat::Tiff),
    (b"II*\x00", b"", ImageFormat::Tiff),
];

/// Sniffs the container format from the leading bytes of a file.
pub fn guess_format(buffer: &[u8]) -> Option<ImageFormat> {
    MAGIC_BYTES
        .iter()
        .find(|(signature, mask, _)| {
            if mask.is_empty() {
                buffer.starts_with(signature)
            } else {
                buffer.len() >= signature.len()
                    && buffer
                        .iter()
                        .zip(signature.iter())
                        .zip(mask.iter())
                        .all(|((&byte, &sig), &mask)| byte & mask == sig)
            }
        })
        .map(|&(_, _, format)| format)
}

/// MIME type for a `data:` URI, falling back to an opaque byte stream.
pub fn mime_from_image(image_data: &[u8]) -> &'static str {
    guess_format(image_data)
        .map(ImageFormat::mime_type)
        .unwrap_or("application/octet-stream")
}
