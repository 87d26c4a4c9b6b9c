// ABOUTME: Little-endian primitive/string/optional/list/map codec over caller-owned byte cursors
// ABOUTME: Read side fails with ShortRead without advancing; write side fails with ShortWrite/ValueTooLarge

use crate::error::RpcError;

/// Strings longer than this cannot be represented on the wire (2-byte length prefix).
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// A read-only cursor over a caller-owned byte slice.
///
/// Every `read_*` method either advances `pos` past the value and returns it,
/// or leaves `pos` untouched and returns `Err(RpcError::ShortRead)`.
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ReadCursor { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RpcError> {
        if self.remaining() < n {
            return Err(RpcError::ShortRead);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_i32(&mut self) -> Result<i32, RpcError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, RpcError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, RpcError> {
        let b = self.take(1)?;
        Ok(b[0] != 0)
    }

    /// Reads the present-tag for an `optional<T>` without reading `T` itself.
    pub fn read_optional_tag(&mut self) -> Result<bool, RpcError> {
        self.read_bool()
    }

    /// Allocating convenience on top of the no-alloc wire form: reads the
    /// 2-byte length prefix then copies that many bytes into an owned `String`.
    ///
    /// This is layered on top of the codec, not the constrained core path —
    /// see `read_string_into` for the caller-buffer primitive the spec pins.
    pub fn read_string(&mut self) -> Result<String, RpcError> {
        let len = self.read_string_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| RpcError::ShortRead)
    }

    /// Reads the 2-byte little-endian string length prefix only.
    fn read_string_len(&mut self) -> Result<usize, RpcError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]) as usize)
    }

    /// Reads a string into a caller-supplied buffer of `buf.len()` bytes,
    /// which must include room for a trailing NUL the codec writes. Fails
    /// with `ShortRead` if the declared string length is `>= buf.len()`.
    /// Returns the number of content bytes written (excluding the NUL).
    pub fn read_string_into(&mut self, buf: &mut [u8]) -> Result<usize, RpcError> {
        let start = self.pos;
        let len = match self.read_string_len() {
            Ok(len) => len,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        if len >= buf.len() {
            self.pos = start;
            return Err(RpcError::ShortRead);
        }
        let bytes = match self.take(len) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        buf[..len].copy_from_slice(bytes);
        buf[len] = 0;
        Ok(len)
    }

    /// Reads `list<T>`: a 4-byte count followed by `count` elements decoded by `f`.
    pub fn read_list<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T, RpcError>,
    ) -> Result<Vec<T>, RpcError> {
        let count = self.read_u32()? as usize;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    /// Reads `map<K,V>`: a 4-byte count followed by `count` (K, V) pairs.
    pub fn read_map<K, V>(
        &mut self,
        mut key: impl FnMut(&mut Self) -> Result<K, RpcError>,
        mut value: impl FnMut(&mut Self) -> Result<V, RpcError>,
    ) -> Result<Vec<(K, V)>, RpcError> {
        let count = self.read_u32()? as usize;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let k = key(self)?;
            let v = value(self)?;
            out.push((k, v));
        }
        Ok(out)
    }

    /// Reads `optional<T>`: a present-tag, then `f` iff present.
    pub fn read_optional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RpcError>,
    ) -> Result<Option<T>, RpcError> {
        if self.read_optional_tag()? {
            Ok(Some(f(self)?))
        } else {
            Ok(None)
        }
    }
}

/// A write cursor over a caller-owned, fixed-size byte slice.
///
/// Every `write_*` method either advances `pos` past the written bytes and
/// returns `Ok(())`, or leaves the buffer's written prefix untouched past
/// `pos` and returns `Err(RpcError::ShortWrite)` (or `ValueTooLarge` for an
/// over-long string).
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        WriteCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn reserve(&mut self, n: usize) -> Result<&mut [u8], RpcError> {
        if self.remaining() < n {
            return Err(RpcError::ShortWrite);
        }
        let slice = &mut self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), RpcError> {
        self.reserve(4)?.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), RpcError> {
        self.reserve(4)?.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), RpcError> {
        self.reserve(1)?[0] = v as u8;
        Ok(())
    }

    pub fn write_optional_tag(&mut self, present: bool) -> Result<(), RpcError> {
        self.write_bool(present)
    }

    /// Writes a string. A `None`/empty source is encoded as an empty string,
    /// matching the reference's "null pointer encodes as empty" rule.
    pub fn write_string(&mut self, s: &str) -> Result<(), RpcError> {
        if s.len() > MAX_STRING_LEN {
            return Err(RpcError::ValueTooLarge);
        }
        self.reserve(2)?
            .copy_from_slice(&(s.len() as u16).to_le_bytes());
        self.reserve(s.len())?.copy_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_list<T>(
        &mut self,
        items: &[T],
        mut f: impl FnMut(&mut Self, &T) -> Result<(), RpcError>,
    ) -> Result<(), RpcError> {
        self.write_u32(items.len() as u32)?;
        for item in items {
            f(self, item)?;
        }
        Ok(())
    }

    pub fn write_map<K, V>(
        &mut self,
        items: &[(K, V)],
        mut key: impl FnMut(&mut Self, &K) -> Result<(), RpcError>,
        mut value: impl FnMut(&mut Self, &V) -> Result<(), RpcError>,
    ) -> Result<(), RpcError> {
        self.write_u32(items.len() as u32)?;
        for (k, v) in items {
            key(self, k)?;
            value(self, v)?;
        }
        Ok(())
    }

    pub fn write_optional<T>(
        &mut self,
        value: Option<&T>,
        f: impl FnOnce(&mut Self, &T) -> Result<(), RpcError>,
    ) -> Result<(), RpcError> {
        match value {
            Some(v) => {
                self.write_optional_tag(true)?;
                f(self, v)
            }
            None => self.write_optional_tag(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_round_trip() {
        let mut buf = [0u8; 4];
        WriteCursor::new(&mut buf).write_i32(-42).unwrap();
        assert_eq!(ReadCursor::new(&buf).read_i32().unwrap(), -42);
    }

    #[test]
    fn u32_round_trip_is_little_endian() {
        let mut buf = [0u8; 4];
        WriteCursor::new(&mut buf).write_u32(0x0102_0304).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(ReadCursor::new(&buf).read_u32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn bool_round_trip() {
        let mut buf = [0u8; 1];
        WriteCursor::new(&mut buf).write_bool(true).unwrap();
        assert_eq!(buf[0], 1);
        assert!(ReadCursor::new(&buf).read_bool().unwrap());
    }

    #[test]
    fn string_round_trip() {
        let mut buf = [0u8; 32];
        let mut w = WriteCursor::new(&mut buf);
        w.write_string("hello").unwrap();
        let n = w.position();
        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(r.read_string().unwrap(), "hello");
        assert_eq!(r.position(), n);
    }

    #[test]
    fn string_too_large_is_value_too_large() {
        let huge = "a".repeat(MAX_STRING_LEN + 1);
        let mut buf = vec![0u8; huge.len() + 8];
        let err = WriteCursor::new(&mut buf).write_string(&huge).unwrap_err();
        assert_eq!(err, RpcError::ValueTooLarge);
    }

    #[test]
    fn read_short_leaves_cursor_untouched() {
        let buf = [0u8; 2];
        let mut r = ReadCursor::new(&buf);
        let before = r.position();
        let err = r.read_i32().unwrap_err();
        assert_eq!(err, RpcError::ShortRead);
        assert_eq!(r.position(), before);
    }

    #[test]
    fn write_short_is_short_write() {
        let mut buf = [0u8; 2];
        let err = WriteCursor::new(&mut buf).write_i32(1).unwrap_err();
        assert_eq!(err, RpcError::ShortWrite);
    }

    #[test]
    fn read_string_into_rejects_when_buf_too_small() {
        let mut buf = [0u8; 32];
        let mut w = WriteCursor::new(&mut buf);
        w.write_string("abcdef").unwrap();
        let n = w.position();
        let mut dest = [0u8; 6]; // needs 7 (6 chars + NUL)
        let err = ReadCursor::new(&buf[..n])
            .read_string_into(&mut dest)
            .unwrap_err();
        assert_eq!(err, RpcError::ShortRead);
    }

    #[test]
    fn read_string_into_writes_trailing_nul() {
        let mut buf = [0u8; 32];
        let mut w = WriteCursor::new(&mut buf);
        w.write_string("abc").unwrap();
        let n = w.position();
        let mut dest = [0xFFu8; 8];
        let len = ReadCursor::new(&buf[..n])
            .read_string_into(&mut dest)
            .unwrap();
        assert_eq!(len, 3);
        assert_eq!(&dest[..4], b"abc\0");
    }

    #[test]
    fn optional_round_trip_present_and_absent() {
        let mut buf = [0u8; 8];
        let mut w = WriteCursor::new(&mut buf);
        w.write_optional(Some(&7i32), |c, v| c.write_i32(*v))
            .unwrap();
        let n = w.position();
        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(r.read_optional(|c| c.read_i32()).unwrap(), Some(7));

        let mut buf2 = [0u8; 8];
        let mut w2 = WriteCursor::new(&mut buf2);
        w2.write_optional(None::<&i32>, |c, v| c.write_i32(*v))
            .unwrap();
        let n2 = w2.position();
        let mut r2 = ReadCursor::new(&buf2[..n2]);
        assert_eq!(r2.read_optional(|c| c.read_i32()).unwrap(), None);
    }

    #[test]
    fn list_round_trip() {
        let items = vec![1i32, 2, 3, 4];
        let mut buf = [0u8; 64];
        let mut w = WriteCursor::new(&mut buf);
        w.write_list(&items, |c, v| c.write_i32(*v)).unwrap();
        let n = w.position();
        let mut r = ReadCursor::new(&buf[..n]);
        let decoded = r.read_list(|c| c.read_i32()).unwrap();
        assert_eq!(decoded, items);
    }

    #[test]
    fn map_round_trip() {
        let items = vec![(1u32, "a".to_string()), (2u32, "b".to_string())];
        let mut buf = [0u8; 64];
        let mut w = WriteCursor::new(&mut buf);
        w.write_map(&items, |c, k| c.write_u32(*k), |c, v| c.write_string(v))
            .unwrap();
        let n = w.position();
        let mut r = ReadCursor::new(&buf[..n]);
        let decoded = r.read_map(|c| c.read_u32(), |c| c.read_string()).unwrap();
        assert_eq!(decoded, items);
    }
}
