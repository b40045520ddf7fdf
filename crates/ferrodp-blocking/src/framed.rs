use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use ferrodp_pdu::PduHint;

/// A framing buffer over any blocking byte stream.
///
/// Bytes are accumulated until a complete TPKT frame is available; leftovers
/// stay buffered for the next call, so a partial PDU on the wire never blocks
/// dispatch of the ones before it.
pub struct Framed<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> (S, BytesMut) {
        (self.stream, self.buf)
    }

    /// The underlying stream, e.g. to fetch the socket descriptor for the
    /// host's poll loop.
    pub fn get_inner(&self) -> (&S, &BytesMut) {
        (&self.stream, &self.buf)
    }

    pub fn get_inner_mut(&mut self) -> (&mut S, &mut BytesMut) {
        (&mut self.stream, &mut self.buf)
    }

    /// The currently buffered, not yet consumed bytes.
    pub fn peek(&self) -> &[u8] {
        &self.buf
    }
}

impl<S> Framed<S>
where
    S: Read,
{
    /// Accumulates at least `length` bytes and returns exactly `length`
    /// bytes, keeping the leftover buffered.
    pub fn read_exact(&mut self, length: usize) -> io::Result<BytesMut> {
        loop {
            if self.buf.len() >= length {
                return Ok(self.buf.split_to(length));
            }

            self.buf.reserve(length - self.buf.len());

            if self.read()? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
            }
        }
    }

    /// Reads the next complete TPKT frame.
    pub fn read_frame(&mut self) -> io::Result<Bytes> {
        loop {
            match ferrodp_pdu::find_size(self.peek()) {
                Ok(Some(length)) => {
                    return Ok(self.read_exact(length)?.freeze());
                }
                Ok(None) => {
                    if self.read()? == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
                    }
                }
                Err(e) => return Err(io::Error::other(e)),
            };
        }
    }

    /// Reads a frame using the provided [`PduHint`].
    pub fn read_by_hint(&mut self, hint: &dyn PduHint) -> io::Result<Bytes> {
        loop {
            match hint.find_size(self.peek()).map_err(io::Error::other)? {
                Some(length) => {
                    return Ok(self.read_exact(length)?.freeze());
                }
                None => {
                    if self.read()? == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
                    }
                }
            }
        }
    }

    /// Reads from the stream and fills the internal buffer, returning the
    /// number of bytes read.
    fn read(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; 16 * 1024];
        let len = self.stream.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..len]);
        Ok(len)
    }
}

impl<S> Framed<S>
where
    S: Write,
{
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_frames_accumulate_until_complete() {
        // One full frame split across reads, followed by leftover bytes.
        let frame: &[u8] = &[0x03, 0x00, 0x00, 0x0B, 0x06, 0xF0, 0x80, 0xDE, 0xAD, 0xBE, 0xEF, 0x03, 0x00];
        let mut framed = Framed::new(frame);

        let read = framed.read_frame().unwrap();
        assert_eq!(read.len(), 11);
        assert_eq!(&read[7..], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(framed.peek(), &[0x03, 0x00]);
    }

    #[test]
    fn eof_before_a_full_frame_is_an_error() {
        let partial: &[u8] = &[0x03, 0x00, 0x00, 0x0B, 0x06];
        let mut framed = Framed::new(partial);
        assert_eq!(framed.read_frame().unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
