
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// Operation byte of a VICP header, most significant bit first:
//
//   D7  DATA        Data block (D0 says whether it ends in EOI)
//   D6  REMOTE      Remote mode
//   D5  LOCKOUT     Local lockout of the front panel
//   D4  CLEAR       Device clear (if sent with data, the clear happens before the block is parsed)
//   D3  SRQ         Service request (device -> host only)
//   D2  SERIALPOLL  Request a serial poll
//   D1  Reserved
//   D0  EOI         Block terminated in EOI

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Operation(u8);

impl Operation {
	pub const NONE:Operation       = Operation(0);
	pub const DATA:Operation       = Operation(1 << 7);
	pub const REMOTE:Operation     = Operation(1 << 6);
	pub const LOCKOUT:Operation    = Operation(1 << 5);
	pub const CLEAR:Operation      = Operation(1 << 4);
	pub const SRQ:Operation        = Operation(1 << 3);
	pub const SERIALPOLL:Operation = Operation(1 << 2);
	pub const RESERVED:Operation   = Operation(1 << 1);
	pub const EOI:Operation        = Operation(1 << 0);

	pub const fn from_bits(bits:u8) -> Self { Operation(bits) }
	pub const fn bits(&self) -> u8 { self.0 }

	pub fn contains(&self, other:Operation) -> bool { (self.0 & other.0) == other.0 }
	pub fn is_empty(&self) -> bool { self.0 == 0 }

	pub fn set(&mut self, other:Operation, on:bool) {
		if on { self.0 |= other.0 }
		else  { self.0 &= !other.0 }
	}
}

impl BitOr for Operation {
	type Output = Operation;
	fn bitor(self, rhs:Operation) -> Operation { Operation(self.0 | rhs.0) }
}

impl BitOrAssign for Operation {
	fn bitor_assign(&mut self, rhs:Operation) { self.0 |= rhs.0 }
}

const NAMES:[(Operation, &str); 8] = [
	(Operation::DATA,       "DATA"),
	(Operation::REMOTE,     "REMOTE"),
	(Operation::LOCKOUT,    "LOCKOUT"),
	(Operation::CLEAR,      "CLEAR"),
	(Operation::SRQ,        "SRQ"),
	(Operation::SERIALPOLL, "SERIALPOLL"),
	(Operation::RESERVED,   "RESERVED"),
	(Operation::EOI,        "EOI"),
];

impl fmt::Display for Operation {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		if self.is_empty() { return write!(f, "NONE"); }

		let names:Vec<&str> = NAMES.iter()
			.filter(|(op, _)| self.contains(*op))
			.map(|(_, name)| *name)
			.collect();
		write!(f, "{}", names.join("|"))
	}
}
