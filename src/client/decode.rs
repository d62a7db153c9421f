//! in-memory decoding of compressed response bodies
use std::io;

use async_compression::tokio::bufread::{BrotliDecoder, DeflateDecoder, GzipDecoder};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{instrument, warn};

/// decode `raw` according to a `Content-Encoding` value
///
/// `gzip`, `deflate` (raw DEFLATE), and `br` are understood; any other value
/// leaves the body untouched. A body that fails to decode is returned as-is.
#[instrument(skip(raw), level = "trace")]
pub(super) async fn decode_body(encoding: &str, raw: Vec<u8>) -> Vec<u8> {
    let decoded = match encoding {
        "gzip" => {
            let mut decoder = GzipDecoder::new(&raw[..]);
            decoder.multiple_members(true);
            read_all(decoder).await
        }
        "deflate" => read_all(DeflateDecoder::new(&raw[..])).await,
        "br" => read_all(BrotliDecoder::new(&raw[..])).await,
        _ => return raw,
    };

    match decoded {
        Ok(body) => body,
        Err(source) => {
            warn!(%encoding, %source, "could not decode response body; falling back to raw bytes");
            raw
        }
    }
}

async fn read_all<R: AsyncRead>(reader: R) -> io::Result<Vec<u8>> {
    tokio::pin!(reader);

    let mut body = Vec::new();
    reader.read_to_end(&mut body).await?;

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::{BrotliEncoder, DeflateEncoder, GzipEncoder};

    const PLAIN: &[u8] = b"<html>the quick brown fox jumps over the lazy dog</html>";

    #[tokio::test]
    async fn known_encodings_are_decoded() {
        let gzipped = read_all(GzipEncoder::new(PLAIN)).await.unwrap();
        let deflated = read_all(DeflateEncoder::new(PLAIN)).await.unwrap();
        let brotlied = read_all(BrotliEncoder::new(PLAIN)).await.unwrap();

        assert_eq!(decode_body("gzip", gzipped).await, PLAIN);
        assert_eq!(decode_body("deflate", deflated).await, PLAIN);
        assert_eq!(decode_body("br", brotlied).await, PLAIN);
    }

    #[tokio::test]
    async fn concatenated_gzip_members_are_all_decoded() {
        let mut gzipped = read_all(GzipEncoder::new(&b"first "[..])).await.unwrap();
        gzipped.extend(read_all(GzipEncoder::new(&b"second"[..])).await.unwrap());

        assert_eq!(decode_body("gzip", gzipped).await, b"first second");
    }

    #[tokio::test]
    async fn undecodable_bodies_fall_back_to_raw_bytes() {
        let garbage = b"definitely not gzip".to_vec();
        let truncated = read_all(GzipEncoder::new(PLAIN)).await.unwrap()[..12].to_vec();

        assert_eq!(decode_body("gzip", truncated.clone()).await, truncated);

        assert_eq!(decode_body("gzip", garbage.clone()).await, garbage);
    }

    #[tokio::test]
    async fn unknown_encodings_pass_through() {
        assert_eq!(decode_body("identity", PLAIN.to_vec()).await, PLAIN);
        assert_eq!(decode_body("", PLAIN.to_vec()).await, PLAIN);
        assert_eq!(decode_body("GZIP", PLAIN.to_vec()).await, PLAIN);
    }
}
