//! Content-Length message framing shared by both sides of the relay.
//!
//! A frame is `Content-Length: <n>\r\n\r\n` followed by exactly `n` bytes
//! of UTF-8 payload. The length counts bytes, not characters.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::DapError;

/// The only header the codec interprets. Matching is case-sensitive.
pub const CONTENT_HEADER: &str = "Content-Length:";

/// Build the header block announcing a payload of `byte_len` bytes.
pub fn encode_header(byte_len: usize) -> String {
    format!("{CONTENT_HEADER} {byte_len}\r\n\r\n")
}

/// Frame `message` for the wire.
pub fn encode_message(message: &str) -> Vec<u8> {
    let header = encode_header(message.len());
    let mut buf = Vec::with_capacity(header.len() + message.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(message.as_bytes());
    buf
}

/// Read the next framed payload from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly between frames. Header
/// blocks that announce no payload are skipped. Ending mid-frame, a bad
/// length, non-UTF-8 payload bytes, or any I/O failure is an error and the
/// caller is expected to stop reading.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<String>, DapError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(content_length) = read_header_block(reader).await? else {
            return Ok(None);
        };

        if content_length == 0 {
            tracing::debug!("skipping frame without payload");
            continue;
        }

        let mut body = vec![0u8; content_length];
        let mut filled = 0;
        while filled < content_length {
            let n = reader.read(&mut body[filled..]).await?;
            if n == 0 {
                return Err(DapError::Framing(format!(
                    "stream ended after {filled} of {content_length} payload bytes"
                )));
            }
            filled += n;
        }

        return String::from_utf8(body)
            .map(Some)
            .map_err(|e| DapError::Framing(format!("payload is not valid UTF-8: {e}")));
    }
}

/// Consume header lines up to the blank separator line. Yields the
/// announced length (0 when no `Content-Length` header was present), or
/// `None` on end-of-stream before any header byte.
async fn read_header_block<R>(reader: &mut R) -> Result<Option<usize>, DapError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = 0;
    let mut saw_header = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            if saw_header {
                return Err(DapError::Framing(
                    "stream ended inside a header block".into(),
                ));
            }
            return Ok(None);
        }
        saw_header = true;

        let header = line.trim();
        if header.is_empty() {
            return Ok(Some(content_length));
        }
        if let Some(value) = header.strip_prefix(CONTENT_HEADER) {
            let value = value.trim();
            content_length = value.parse::<usize>().map_err(|e| {
                DapError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    async fn decode_all(data: &[u8]) -> Vec<Result<Option<String>, String>> {
        let mut reader = BufReader::new(data);
        let mut out = Vec::new();
        loop {
            match read_message(&mut reader).await {
                Ok(Some(msg)) => out.push(Ok(Some(msg))),
                Ok(None) => {
                    out.push(Ok(None));
                    return out;
                }
                Err(e) => {
                    out.push(Err(e.to_string()));
                    return out;
                }
            }
        }
    }

    #[test]
    fn transport_header_counts_bytes_not_chars() {
        let msg = r#"{"output":"héllo ✓"}"#;
        let framed = String::from_utf8(encode_message(msg)).unwrap();
        assert!(framed.starts_with(&format!("Content-Length: {}\r\n\r\n", msg.len())));
        assert_ne!(msg.len(), msg.chars().count());
        assert!(framed.ends_with(msg));
    }

    #[tokio::test]
    async fn transport_round_trip_multibyte() {
        for msg in [
            "{}",
            r#"{"seq":1,"command":"initialize"}"#,
            r#"{"body":{"output":"日本語のテキスト 🐍"}}"#,
        ] {
            let framed = encode_message(msg);
            let mut reader = BufReader::new(framed.as_slice());
            assert_eq!(read_message(&mut reader).await.unwrap().as_deref(), Some(msg));
            assert_eq!(read_message(&mut reader).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn transport_back_to_back_frames() {
        let mut data = encode_message(r#"{"seq":1}"#);
        data.extend(encode_message(r#"{"seq":2}"#));
        let out = decode_all(&data).await;
        assert_eq!(
            out,
            vec![
                Ok(Some(r#"{"seq":1}"#.to_string())),
                Ok(Some(r#"{"seq":2}"#.to_string())),
                Ok(None),
            ]
        );
    }

    #[tokio::test]
    async fn transport_ignores_other_headers() {
        let data = b"Content-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let out = decode_all(data).await;
        assert_eq!(out[0], Ok(Some("{}".to_string())));
    }

    #[tokio::test]
    async fn transport_header_match_is_case_sensitive() {
        // A lower-case header is not recognised, so the block announces no
        // payload and is skipped.
        let data = b"content-length: 2\r\n\r\n";
        let out = decode_all(data).await;
        assert_eq!(out, vec![Ok(None)]);
    }

    #[tokio::test]
    async fn transport_skips_empty_header_block() {
        let mut data = b"\r\n".to_vec();
        data.extend(encode_message(r#"{"seq":7}"#));
        let out = decode_all(&data).await;
        assert_eq!(out[0], Ok(Some(r#"{"seq":7}"#.to_string())));
    }

    #[tokio::test]
    async fn transport_truncated_body_is_error() {
        let data = b"Content-Length: 100\r\n\r\n{\"short\":true}";
        let out = decode_all(data).await;
        let err = out[0].clone().unwrap_err();
        assert!(err.contains("stream ended after 14 of 100"), "got: {err}");
    }

    #[tokio::test]
    async fn transport_eof_inside_header_is_error() {
        let out = decode_all(b"Content-Length: 2\r\n").await;
        let err = out[0].clone().unwrap_err();
        assert!(err.contains("inside a header block"), "got: {err}");
    }

    #[tokio::test]
    async fn transport_invalid_length_is_error() {
        let out = decode_all(b"Content-Length: abc\r\n\r\n{}").await;
        let err = out[0].clone().unwrap_err();
        assert!(err.contains("invalid Content-Length value 'abc'"), "got: {err}");
    }

    #[tokio::test]
    async fn transport_invalid_utf8_payload_is_error() {
        let mut data = b"Content-Length: 2\r\n\r\n".to_vec();
        data.extend([0xff, 0xfe]);
        let out = decode_all(&data).await;
        assert!(out[0].clone().unwrap_err().contains("not valid UTF-8"));
    }

    #[tokio::test]
    async fn transport_reassembles_partial_reads() {
        let msg = r#"{"command":"stackTrace","arguments":{"threadId":1}}"#;
        let framed = encode_message(msg);
        let (client, server) = tokio::io::duplex(8);

        let writer = tokio::spawn(async move {
            let mut client = client;
            for chunk in framed.chunks(5) {
                client.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut reader = BufReader::new(server);
        let got = read_message(&mut reader).await.unwrap();
        writer.await.unwrap();
        assert_eq!(got.as_deref(), Some(msg));
    }
}
