//! Response compression for JSON routes.

use tower_http::compression::CompressionLayer;

/// Builds a gzip compression layer.
///
/// Applied to the `/api` routes only; converted documents are already
/// compressed formats and are streamed with an exact `Content-Length`.
pub fn build_compression_layer() -> CompressionLayer {
    CompressionLayer::new().gzip(true)
}
