//! Length-prefixed frame encoding over byte streams.
//!
//! Every message travels as:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Unknown headers are tolerated and skipped.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use crate::error::WireError;

/// Writes framed messages to a byte sink.
pub struct FrameWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps a byte sink.
    pub fn new(sink: W) -> Self {
        Self {
            inner: BufWriter::new(sink),
        }
    }

    /// Sends one framed message.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] when writing to the sink fails.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), WireError> {
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());
        self.inner.write_all(header.as_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Reads framed messages from a byte source.
pub struct FrameReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a byte source.
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
        }
    }

    /// Receives one framed message, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MissingContentLength`] when the headers carry no
    /// length, [`WireError::InvalidHeader`] when the length does not parse,
    /// and [`WireError::Io`] on read failure or EOF mid-frame.
    pub fn receive(&mut self) -> Result<Vec<u8>, WireError> {
        let content_length = self.read_headers()?;
        let mut payload = vec![0u8; content_length];
        self.inner.read_exact(&mut payload)?;
        Ok(payload)
    }

    fn read_headers(&mut self) -> Result<usize, WireError> {
        let mut content_length: Option<usize> = None;

        loop {
            let mut line = String::new();
            let bytes_read = self.inner.read_line(&mut line)?;
            if bytes_read == 0 {
                return Err(WireError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while reading frame headers",
                )));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                // Blank line terminates the header block.
                break;
            }

            if let Some(value) = trimmed.strip_prefix("Content-Length: ") {
                content_length = Some(value.parse().map_err(|_| WireError::InvalidHeader)?);
            }
        }

        content_length.ok_or(WireError::MissingContentLength)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn written(payload: &[u8]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.send(payload).expect("send");
        }
        buffer
    }

    #[rstest]
    fn frames_carry_length_header() {
        let bytes = written(b"test payload");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.starts_with("Content-Length: 12\r\n\r\n"));
        assert!(text.ends_with("test payload"));
    }

    #[rstest]
    fn empty_payload_frames() {
        let bytes = written(b"");
        assert_eq!(bytes, b"Content-Length: 0\r\n\r\n");
    }

    #[rstest]
    fn receive_round_trips_send() {
        let bytes = written(br#"{"id":1,"service":"driver","method":"Ping"}"#);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let payload = reader.receive().expect("receive");
        assert_eq!(payload, br#"{"id":1,"service":"driver","method":"Ping"}"#);
    }

    #[rstest]
    fn unknown_headers_are_skipped() {
        let input = b"Content-Length: 4\r\nContent-Type: application/json\r\n\r\ntest";
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()));
        assert_eq!(reader.receive().expect("receive"), b"test");
    }

    #[rstest]
    fn missing_length_is_rejected() {
        let input = b"Content-Type: application/json\r\n\r\ntest";
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()));
        assert!(matches!(
            reader.receive(),
            Err(WireError::MissingContentLength)
        ));
    }

    #[rstest]
    fn malformed_length_is_rejected() {
        let input = b"Content-Length: lots\r\n\r\ntest";
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()));
        assert!(matches!(reader.receive(), Err(WireError::InvalidHeader)));
    }

    #[rstest]
    fn eof_during_headers_is_io_error() {
        let input = b"Content-Length: 10";
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()));
        assert!(matches!(reader.receive(), Err(WireError::Io(_))));
    }

    #[rstest]
    fn eof_during_payload_is_io_error() {
        let input = b"Content-Length: 10\r\n\r\nshort";
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()));
        assert!(matches!(reader.receive(), Err(WireError::Io(_))));
    }

    #[rstest]
    fn consecutive_frames_read_in_order() {
        let mut bytes = written(b"first");
        bytes.extend(written(b"second"));
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.receive().expect("first"), b"first");
        assert_eq!(reader.receive().expect("second"), b"second");
    }
}
