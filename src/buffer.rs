use std::io;

/// Cursor-backed wire buffer. The cursor tracks the current read position;
/// writes always append.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            cursor: 0,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    fn ensure(&self, count: usize, what: &str) -> io::Result<()> {
        if self.cursor + count > self.buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Not enough bytes to read {}", what),
            ));
        }
        Ok(())
    }

    /// Writes a VarInt to the buffer. Encoded using 7 bits per byte, with the
    /// most significant bit of each byte set unless it is the final byte.
    pub fn write_varint(&mut self, mut value: i32) {
        while (value & !0x7F) != 0 {
            self.buffer.push(((value & 0x7F) as u8) | 0x80);
            value = ((value as u32) >> 7) as i32;
        }
        self.buffer.push((value & 0x7F) as u8);
    }

    /// Reads a VarInt from the buffer.
    pub fn read_varint(&mut self) -> io::Result<i32> {
        let mut result = 0;
        let mut shift = 0;

        loop {
            if self.cursor >= self.buffer.len() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF while reading VarInt",
                ));
            }

            let byte = self.buffer[self.cursor];
            self.cursor += 1;

            result |= ((byte & 0x7F) as i32) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            if shift >= 32 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "VarInt too big"));
            }
        }

        Ok(result)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.ensure(1, "u8")?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    // Write an u16 in network (big-endian) order.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    // Read an u16 in network (big-endian) order.
    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.ensure(2, "u16")?;
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&self.buffer[self.cursor..self.cursor + 2]);
        self.cursor += 2;
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.ensure(8, "u64")?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buffer[self.cursor..self.cursor + 8]);
        self.cursor += 8;
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn write_bytes_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn read_bytes(&mut self, count: usize) -> io::Result<&[u8]> {
        self.ensure(count, "raw bytes")?;
        let slice = &self.buffer[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }
}
