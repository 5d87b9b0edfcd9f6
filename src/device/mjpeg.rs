//! Splits a concatenated MJPEG byte stream into individual JPEG images.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

// A single preview frame never gets near this; anything larger is garbage
const MAX_BUFFERED: usize = 16 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct MjpegSplitter {
    buf: Vec<u8>,
}

impl MjpegSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes and return every JPEG completed by them, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find(&self.buf, &SOI, 0) else {
                // Keep a trailing 0xFF, it may be the first half of a marker
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                self.buf.drain(..self.buf.len() - keep);
                break;
            };
            if start > 0 {
                self.buf.drain(..start);
            }
            let Some(end) = find(&self.buf, &EOI, SOI.len()) else {
                break;
            };
            let frame: Vec<u8> = self.buf.drain(..end + EOI.len()).collect();
            frames.push(frame);
        }

        if self.buf.len() > MAX_BUFFERED {
            self.buf.clear();
        }
        frames
    }

    /// Bytes held back waiting for the end of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
