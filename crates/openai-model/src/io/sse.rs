use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Chunks(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Comment lines and fields other than `data` are skipped. Multiple `data`
/// lines within one event are joined with `\n`.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            if self.exhausted {
                // A trailing partial event without a blank line is dropped.
                return Ok(None);
            }
            match self.chunks.next_chunk().await.map_err(Error::Chunks)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            let Some((block_len, sep_len)) = find_blank_line(&self.buf) else {
                return Ok(None);
            };
            let block: Vec<u8> = self.buf.drain(..block_len + sep_len).collect();
            let block = std::str::from_utf8(&block[..block_len])
                .map_err(|_| Error::InvalidPayload)?;

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match field {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }
            if let Some(data) = data {
                return Ok(Some(data));
            }
            // Comment-only block, keep looking.
        }
    }
}

/// Finds the first event terminator, returning the block length and the
/// terminator length.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
