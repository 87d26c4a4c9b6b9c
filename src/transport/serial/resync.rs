// ABOUTME: Standalone resynchronization state machine for prefix/suffix-framed serial streams
// ABOUTME: Feed it arbitrarily chunked bytes; it yields complete frames and recovers from garbage

use crate::frame::HEADER_LEN;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    SeekPrefix,
    ReadFrame,
}

/// Implements the four-step resync algorithm an external read task runs
/// over a raw serial byte stream: scan/slide for the configured prefix,
/// read the five header bytes, read `payload_len` further bytes, then
/// verify the configured suffix — restarting the scan on any mismatch.
///
/// This type does no I/O of its own; the embedding application owns the
/// actual UART read loop and calls `feed` with whatever chunk just arrived.
pub struct FrameResynchronizer {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    payload_max: usize,
    input: Vec<u8>,
    stage: Stage,
}

impl FrameResynchronizer {
    pub fn new(prefix: Vec<u8>, suffix: Vec<u8>, payload_max: usize) -> Self {
        FrameResynchronizer {
            prefix,
            suffix,
            payload_max,
            input: Vec::new(),
            stage: Stage::SeekPrefix,
        }
    }

    /// Feeds `chunk` into the internal buffer and extracts as many complete
    /// frames (header + payload, markers stripped) as the accumulated input
    /// now contains. Returns an empty vec if no frame completed yet.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.input.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            match self.stage {
                Stage::SeekPrefix => {
                    if self.prefix.is_empty() {
                        self.stage = Stage::ReadFrame;
                        continue;
                    }
                    match find_subslice(&self.input, &self.prefix) {
                        Some(pos) => {
                            self.input.drain(..pos + self.prefix.len());
                            self.stage = Stage::ReadFrame;
                        }
                        None => {
                            let keep = longest_prefix_overlap(&self.input, &self.prefix);
                            let drop_to = self.input.len() - keep;
                            self.input.drain(..drop_to);
                            return frames;
                        }
                    }
                }
                Stage::ReadFrame => {
                    if self.input.len() < HEADER_LEN {
                        return frames;
                    }
                    let payload_len =
                        u16::from_le_bytes([self.input[3], self.input[4]]) as usize;
                    if payload_len > self.payload_max {
                        self.input.drain(..1);
                        self.stage = Stage::SeekPrefix;
                        continue;
                    }
                    let frame_total = HEADER_LEN + payload_len;
                    let need = frame_total + self.suffix.len();
                    if self.input.len() < need {
                        return frames;
                    }
                    if !self.suffix.is_empty() && self.input[frame_total..need] != self.suffix[..] {
                        self.input.drain(..1);
                        self.stage = Stage::SeekPrefix;
                        continue;
                    }
                    frames.push(self.input[..frame_total].to_vec());
                    self.input.drain(..need);
                    self.stage = Stage::SeekPrefix;
                }
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Longest suffix of `haystack` that is also a prefix of `needle` — the
/// amount of a partial marker match worth keeping across a chunk boundary.
fn longest_prefix_overlap(haystack: &[u8], needle: &[u8]) -> usize {
    let max = haystack.len().min(needle.len());
    for len in (1..=max).rev() {
        if haystack[haystack.len() - len..] == needle[..len] {
            return len;
        }
    }
    0
}
