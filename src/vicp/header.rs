
use std::io::{self, Cursor, Error, ErrorKind};

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};

use super::operation::Operation;
use super::VICP_VERSION;

pub const HEADER_LEN:usize = 8;

// Byte  Description
// ----  ----------------------------------------
//  0    Operation
//  1    Version (always 1)
//  2    Sequence number { 1..255 }
//  3    Unused
//  4-7  Block size, big-endian i32, not including this header

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	pub operation: Operation,
	pub version: u8,
	pub sequence: u8,
	pub block_size: i32,
}

impl Header {

	pub fn new(operation:Operation, sequence:u8, block_size:i32) -> Self {
		Self{ operation, version: VICP_VERSION, sequence, block_size }
	}

	pub fn is_eoi(&self) -> bool { self.operation.contains(Operation::EOI) }

	pub fn pack(&self) -> io::Result<Vec<u8>> {
		let mut buff:Vec<u8> = Vec::with_capacity(HEADER_LEN);
		buff.write_u8(self.operation.bits())?;
		buff.write_u8(self.version)?;
		buff.write_u8(self.sequence)?;
		buff.write_u8(0)?;
		buff.write_i32::<BigEndian>(self.block_size)?;
		Ok(buff)
	}

	pub fn unpack(data:&[u8]) -> io::Result<Self> {
		if data.len() < HEADER_LEN {
			return Err(Error::new(ErrorKind::UnexpectedEof, "Fewer than eight bytes available for a VICP header"));
		}

		let mut rdr = Cursor::new(data);
		let operation:Operation = Operation::from_bits(rdr.read_u8()?);
		let version:u8          = rdr.read_u8()?;
		let sequence:u8         = rdr.read_u8()?;
		let _unused:u8          = rdr.read_u8()?;
		let block_size:i32      = rdr.read_i32::<BigEndian>()?;

		Ok(Self{ operation, version, sequence, block_size })
	}

	// Number of payload bytes that follow the header on the wire
	pub fn payload_len(&self) -> io::Result<usize> {
		if self.block_size < 0 {
			Err(Error::new(ErrorKind::InvalidData, format!("Negative block size {} in VICP header", self.block_size)))
		} else {
			Ok(self.block_size as usize)
		}
	}

}

// Header followed by payload, ready for a single write
pub fn pack_frame(operation:Operation, sequence:u8, payload:&[u8]) -> io::Result<Vec<u8>> {
	if payload.len() > std::i32::MAX as usize {
		return Err(Error::new(ErrorKind::InvalidInput, "Payload too large for a single VICP block"));
	}

	let mut frame:Vec<u8> = Header::new(operation, sequence, payload.len() as i32).pack()?;
	frame.extend_from_slice(payload);
	Ok(frame)
}
