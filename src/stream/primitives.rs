//! Little-endian primitive read/write helpers layered on top of [`super::Stream`].
//!
//! The original C++ source reads fixed-size POD structs generically; Rust has no equivalent
//! blanket mechanism, so each fixed-width primitive the archive parsers actually need gets its own
//! method here, backed by `byteorder`.

use crate::error::Result;
use crate::stream::Stream;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};

/// Little-endian primitive reads over any [`Stream`].
pub trait ReadPrimitives: Stream {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_buf(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_buf(&mut buf)?;
        Ok((&buf[..]).read_u16::<LE>().expect("fixed-size buffer"))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_buf(&mut buf)?;
        Ok((&buf[..]).read_u32::<LE>().expect("fixed-size buffer"))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_buf(&mut buf)?;
        Ok((&buf[..]).read_u64::<LE>().expect("fixed-size buffer"))
    }

    fn read_i32_le(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_buf(&mut buf)?;
        Ok((&buf[..]).read_i32::<LE>().expect("fixed-size buffer"))
    }

    fn read_f32_le(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact_buf(&mut buf)?;
        Ok((&buf[..]).read_f32::<LE>().expect("fixed-size buffer"))
    }

    /// Reads `buf.len()` bytes, erroring on short read (EOF).
    fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(crate::error::VfsError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected end of stream",
                )));
            }
            filled += n;
        }
        Ok(())
    }

    /// Reads a length-prefixed UTF-8 string: `u16` byte count followed by the bytes.
    fn read_u16_prefixed_string(&mut self) -> Result<String> {
        let len = self.read_u16_le()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact_buf(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<T: Stream + ?Sized> ReadPrimitives for T {}

/// Little-endian primitive writes over any [`Stream`].
pub trait WritePrimitives: Stream {
    fn write_u32_le(&mut self, value: u32) -> Result<()> {
        let mut buf = Vec::with_capacity(4);
        buf.write_u32::<LE>(value).expect("vec write cannot fail");
        self.write_all_buf(&buf)
    }

    fn write_all_buf(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(crate::error::VfsError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted zero bytes",
                )));
            }
            written += n;
        }
        Ok(())
    }
}

impl<T: Stream + ?Sized> WritePrimitives for T {}
