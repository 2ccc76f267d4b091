//! Frame Decoder
//!
//! Turns the raw response body into complete `\n`-terminated lines. Bytes are
//! carried, not text, so a multi-byte character split across two reads is
//! decoded intact once its tail arrives.

use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Splits a byte stream into lines, holding back a trailing partial line
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes
    ///
    /// Lines are returned without their terminator (a trailing `\r` is also
    /// dropped). Blank lines are returned too; filtering them is the caller's job.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let Some(last_newline) = self.carry.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|line| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    /// Bytes held back waiting for a newline
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// End of stream: any unterminated trailing fragment is discarded
    ///
    /// Returns the number of bytes dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.carry.len();
        if dropped > 0 {
            tracing::warn!(
                bytes = dropped,
                "Stream ended mid-line; discarding unterminated fragment"
            );
            self.carry.clear();
        }
        dropped
    }
}

/// Lazily decode a body stream into lines
///
/// Transport errors are yielded in place and end the sequence.
pub fn decode_lines<S>(body: S) -> impl Stream<Item = anyhow::Result<String>>
where
    S: Stream<Item = anyhow::Result<Bytes>>,
{
    async_stream::try_stream! {
        let mut decoder = FrameDecoder::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in decoder.push(&chunk) {
                yield line;
            }
        }

        decoder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = "{\"a\":1}\n{\"b\":\"héllo wörld\"}\n\n{\"done\":true}\n";

    fn decode_with_splits(body: &[u8], splits: &[usize]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &split in splits {
            lines.extend(decoder.push(&body[start..split]));
            start = split;
        }
        lines.extend(decoder.push(&body[start..]));
        decoder.finish();
        lines
    }

    #[test]
    fn test_single_chunk() {
        let lines = decode_with_splits(BODY.as_bytes(), &[]);
        assert_eq!(
            lines,
            vec!["{\"a\":1}", "{\"b\":\"héllo wörld\"}", "", "{\"done\":true}"]
        );
    }

    #[test]
    fn test_every_split_point_yields_same_lines() {
        let body = BODY.as_bytes();
        let expected = decode_with_splits(body, &[]);

        for split in 0..=body.len() {
            assert_eq!(decode_with_splits(body, &[split]), expected, "split at {split}");
        }

        for a in 0..body.len() {
            for b in a..body.len() {
                assert_eq!(decode_with_splits(body, &[a, b]), expected);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let body = BODY.as_bytes();
        let splits: Vec<usize> = (1..body.len()).collect();
        assert_eq!(decode_with_splits(body, &splits), decode_with_splits(body, &[]));
    }

    #[test]
    fn test_partial_line_is_held_then_dropped() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b"{\"message\":"), Vec::<String>::new());
        assert_eq!(decoder.pending(), 11);
        assert_eq!(decoder.finish(), 11);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_crlf_terminators() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_decode_lines_stream() {
        let chunks: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"x\":")),
            Ok(Bytes::from_static(b"1}\n{\"y\"")),
            Ok(Bytes::from_static(b":2}\ntrailing")),
        ];

        let lines: Vec<String> = decode_lines(futures::stream::iter(chunks))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["{\"x\":1}", "{\"y\":2}"]);
    }

    #[tokio::test]
    async fn test_decode_lines_surfaces_transport_error() {
        let chunks: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ok\n")),
            Err(anyhow::anyhow!("connection reset")),
            Ok(Bytes::from_static(b"never\n")),
        ];

        let results: Vec<anyhow::Result<String>> =
            decode_lines(futures::stream::iter(chunks)).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "ok");
        assert!(results[1].as_ref().unwrap_err().to_string().contains("reset"));
    }

    #[test]
    fn test_decode_lines_waits_for_newline() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<anyhow::Result<Bytes>>();
        let mut lines = tokio_test::task::spawn(decode_lines(rx));

        tokio_test::assert_pending!(lines.poll_next());

        tx.unbounded_send(Ok(Bytes::from_static(b"{\"a\":"))).unwrap();
        tokio_test::assert_pending!(lines.poll_next());

        tx.unbounded_send(Ok(Bytes::from_static(b"1}\n"))).unwrap();
        assert!(lines.is_woken());
        let line = tokio_test::assert_ready!(lines.poll_next());
        assert_eq!(line.unwrap().unwrap(), "{\"a\":1}");
    }
}
