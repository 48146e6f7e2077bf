use super::FormatError;

/// Bounds-checked cursor over a byte buffer.
#[derive(Debug, Clone)]
pub(super) struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(super) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(super) const fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    pub(super) const fn offset(&self) -> usize {
        self.offset
    }

    pub(super) const fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub(super) fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(FormatError::Truncated {
                offset: self.offset,
            })?;
        let slice = self.bytes.get(self.offset..end).ok_or(FormatError::Truncated {
            offset: self.offset,
        })?;
        self.offset = end;
        Ok(slice)
    }

    pub(super) fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.take(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let offset = self.offset;
        self.take(N)?
            .try_into()
            .map_err(|_| FormatError::Truncated { offset })
    }

    pub(super) fn u8(&mut self) -> Result<u8, FormatError> {
        self.array::<1>().map(|[byte]| byte)
    }

    pub(super) fn i32_be(&mut self) -> Result<i32, FormatError> {
        self.array().map(i32::from_be_bytes)
    }

    pub(super) fn i32_le(&mut self) -> Result<i32, FormatError> {
        self.array().map(i32::from_le_bytes)
    }

    pub(super) fn u16_le(&mut self) -> Result<u16, FormatError> {
        self.array().map(u16::from_le_bytes)
    }

    pub(super) fn u32_le(&mut self) -> Result<u32, FormatError> {
        self.array().map(u32::from_le_bytes)
    }

    pub(super) fn f64_le(&mut self) -> Result<f64, FormatError> {
        self.array().map(f64::from_le_bytes)
    }

    /// Read a non-negative little-endian count.
    pub(super) fn count_le(&mut self) -> Result<usize, FormatError> {
        let offset = self.offset;
        let value = self.i32_le()?;
        usize::try_from(value).map_err(|_| FormatError::NegativeCount { offset, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn reads_mixed_endianness() {
        let mut bytes = 9994_i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&1000_i32.to_le_bytes());
        bytes.extend_from_slice(&1.5_f64.to_le_bytes());
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.i32_be().expect("file code"), 9994);
        assert_eq!(reader.i32_le().expect("version"), 1000);
        assert!((reader.f64_le().expect("double") - 1.5).abs() < f64::EPSILON);
        assert_eq!(reader.remaining(), 0);
    }

    #[rstest]
    fn reports_truncation_offset() {
        let bytes = [0_u8; 6];
        let mut reader = ByteReader::at(&bytes, 4);
        assert_eq!(
            reader.i32_le().expect_err("too short"),
            FormatError::Truncated { offset: 4 }
        );
    }

    #[rstest]
    fn rejects_negative_counts() {
        let bytes = (-3_i32).to_le_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            reader.count_le().expect_err("negative"),
            FormatError::NegativeCount {
                offset: 0,
                value: -3
            }
        );
    }
}
