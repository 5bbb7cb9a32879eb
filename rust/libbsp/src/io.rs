use crate::types::*;
use bytes::{Buf, BufMut};
use std::convert::TryInto;
use std::mem::size_of;
use typed_ints::TypedInt;

pub const BSP_VERSION: u32 = 38;

/// Format parameters threaded through every record read/write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub bsp: u32,
}

impl Version {
    pub fn new() -> Version {
        Version { bsp: BSP_VERSION }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new()
    }
}

pub trait Readable<T> {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<T>;
}

pub trait Writable<T> {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()>;
}

/// Read fixed-size records until the buffer is exhausted. Lumps carry no
/// element count, the count is implied by the lump length.
pub fn read_records<T>(from: &mut dyn Buf, version: &mut Version) -> BspResult<Vec<T>>
where
    T: Readable<T>,
{
    let mut result = vec![];
    while from.has_remaining() {
        result.push(T::read(from, version)?);
    }
    Ok(result)
}

pub fn write_records<T>(records: &[T], to: &mut dyn BufMut, version: &Version) -> BspResult<()>
where
    T: Writable<T>,
{
    for record in records {
        record.write(to, version)?;
    }
    Ok(())
}

/// Encode a slice of records into a standalone payload.
pub fn records_to_bytes<T>(records: &[T], version: &Version) -> BspResult<Vec<u8>>
where
    T: Writable<T>,
{
    let mut buf: Vec<u8> = vec![];
    write_records(records, &mut buf, version)?;
    Ok(buf)
}

impl<T> Readable<Vec<T>> for Vec<T>
where
    T: Readable<T>,
{
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Vec<T>> {
        let length = u32::read(from, version)?;
        let mut result: Vec<T> = Vec::with_capacity(length as usize);
        for _ in 0..length {
            result.push(T::read(from, version)?);
        }
        Ok(result)
    }
}

impl<T> Writable<Vec<T>> for Vec<T>
where
    T: Writable<T>,
{
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        (self.len() as u32).write(to, version)?;
        write_records(self, to, version)
    }
}

impl<T, const N: usize> Readable<[T; N]> for [T; N]
where
    T: Readable<T>,
{
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<[T; N]> {
        let mut items: Vec<T> = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::read(from, version)?);
        }
        items
            .try_into()
            .map_err(|_| BspError::from("Array length mismatch"))
    }
}

impl<T, const N: usize> Writable<[T; N]> for [T; N]
where
    T: Writable<T>,
{
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        write_records(self, to, version)
    }
}

// Fixed-width, NUL padded string field.
impl Readable<String> for String {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        let raw = <[u8; TEXTURE_NAME_LENGTH]>::read(from, version)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8(raw[..end].to_vec())?)
    }
}

impl Writable<String> for String {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        if self.len() >= TEXTURE_NAME_LENGTH {
            return Err(BspError::from(format!(
                "Name \"{}\" does not fit in {} bytes",
                self, TEXTURE_NAME_LENGTH
            )));
        }
        let mut raw = [0u8; TEXTURE_NAME_LENGTH];
        raw[..self.len()].copy_from_slice(self.as_bytes());
        raw.write(to, version)
    }
}

macro_rules! primitive_readable {
    ($ty: ty, $read_fn: ident) => {
        impl Readable<$ty> for $ty {
            fn read(from: &mut dyn Buf, _version: &mut Version) -> BspResult<Self> {
                if from.remaining() < size_of::<Self>() {
                    return Err(BspError::from("EOF"));
                }
                Ok(from.$read_fn())
            }
        }
    };
}

macro_rules! primitive_writable {
    ($ty: ty, $write_fn: ident) => {
        impl Writable<$ty> for $ty {
            fn write(&self, to: &mut dyn BufMut, _version: &Version) -> BspResult<()> {
                if to.remaining_mut() < size_of::<Self>() {
                    return Err(BspError::from("Buffer full"));
                }
                Ok(to.$write_fn(*self))
            }
        }
    };
}

primitive_readable!(u8, get_u8);
primitive_readable!(u16, get_u16_le);
primitive_readable!(u32, get_u32_le);

primitive_readable!(i8, get_i8);
primitive_readable!(i16, get_i16_le);
primitive_readable!(i32, get_i32_le);

primitive_readable!(f32, get_f32_le);

primitive_writable!(u8, put_u8);
primitive_writable!(u16, put_u16_le);
primitive_writable!(u32, put_u32_le);

primitive_writable!(i8, put_i8);
primitive_writable!(i16, put_i16_le);
primitive_writable!(i32, put_i32_le);

primitive_writable!(f32, put_f32_le);

impl<T, X> Readable<TypedInt<T, X>> for TypedInt<T, X>
where
    T: Readable<T> + Copy,
{
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<TypedInt<T, X>> {
        T::read(from, version).map(|b| Self::from(b))
    }
}

impl<T, X> Writable<TypedInt<T, X>> for TypedInt<T, X>
where
    T: Writable<T> + Copy,
{
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        self.inner().write(to, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn primitives_are_little_endian() {
        let mut buf: Vec<u8> = vec![];
        let version = Version::new();
        0x01020304u32.write(&mut buf, &version).unwrap();
        (-2i16).write(&mut buf, &version).unwrap();
        assert_eq!(buf, vec![4, 3, 2, 1, 0xfe, 0xff]);

        let mut cursor = Cursor::new(buf);
        let mut version = Version::new();
        assert_eq!(u32::read(&mut cursor, &mut version).unwrap(), 0x01020304);
        assert_eq!(i16::read(&mut cursor, &mut version).unwrap(), -2);
        assert!(u8::read(&mut cursor, &mut version).is_err());
    }

    #[test]
    fn strings_are_fixed_width() {
        let mut buf: Vec<u8> = vec![];
        let version = Version::new();
        "e1u1/floor".to_string().write(&mut buf, &version).unwrap();
        assert_eq!(buf.len(), TEXTURE_NAME_LENGTH);

        let mut cursor = Cursor::new(buf);
        let mut version = Version::new();
        assert_eq!(String::read(&mut cursor, &mut version).unwrap(), "e1u1/floor");

        let long = "x".repeat(TEXTURE_NAME_LENGTH);
        let mut buf: Vec<u8> = vec![];
        assert!(long.write(&mut buf, &Version::new()).is_err());
    }

    #[test]
    fn records_read_until_exhausted() {
        let version = Version::new();
        let bytes = records_to_bytes(&[1i32, -1, 7][..], &version).unwrap();
        assert_eq!(bytes.len(), 12);
        let mut cursor = Cursor::new(bytes);
        let mut version = Version::new();
        let values: Vec<i32> = read_records(&mut cursor, &mut version).unwrap();
        assert_eq!(values, vec![1, -1, 7]);
    }
}
