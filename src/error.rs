use thiserror::Error;

/// Errors that abort a pipeline invocation.
///
/// Degenerate inputs (flat images, empty region sets, empty masks) are not
/// errors; they produce valid but visually degenerate results. Only failures
/// to decode the request image, or to re-encode an output buffer, are fatal.
#[derive(Error, Debug)]
pub enum ColorbookError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode PNG output: {0}")]
    Encode(#[source] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ColorbookError>;
