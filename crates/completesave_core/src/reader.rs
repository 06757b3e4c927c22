use std::fmt;

/// A read that would have run past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "need {} bytes at offset {}, only {} available",
            self.needed, self.offset, self.available
        )
    }
}

impl std::error::Error for OutOfBounds {}

/// Cursor over an in-memory buffer. Failed reads leave the cursor where it was.
pub struct SliceReader<'a> {
    inner: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(inner: &'a [u8]) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.inner.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.inner.len()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], OutOfBounds> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.inner.len())
            .ok_or(OutOfBounds {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            })?;
        let bytes = &self.inner[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], OutOfBounds> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, OutOfBounds> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, OutOfBounds> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, OutOfBounds> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn skip(&mut self, n: usize) -> Result<(), OutOfBounds> {
        self.read_bytes(n).map(|_| ())
    }
}
