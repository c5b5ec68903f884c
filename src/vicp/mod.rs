
pub const VICP_VERSION:u8  = 1;
pub const DEFAULT_PORT:u16 = 1861;

// Outgoing blocks always carry sequence number 1, the instruments don't check it
pub const TX_SEQUENCE:u8 = 1;

pub const DEFAULT_TIMEOUT:Duration         = Duration::from_secs(1);
pub const CONNECT_POLL_INTERVAL:Duration   = Duration::from_millis(200);

// Socket timeouts of zero mean "block forever" to the OS, so never hand one over
const MIN_IO_TIMEOUT:Duration = Duration::from_millis(1);

const PAYLOAD_CHUNK:usize = 64 * 1024;

use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::Drop;
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

pub mod operation;
pub mod header;

pub use operation::Operation;
pub use header::Header;

use header::{HEADER_LEN, pack_frame};

fn is_timeout(e:&io::Error) -> bool {
	e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
}

// Payload of one logical message.  `terminated` is false when the message was cut short
// because the socket went quiet before a block with EOI arrived.  A peer that has hung up
// before a frame starts is an error (ConnectionAborted) instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reception {
	pub data: Vec<u8>,
	pub terminated: bool,
}

pub struct VicpClient {
	ip: String,
	port: u16,
	stream: Option<TcpStream>,
	timeout: Duration,
	remote: bool,
	lockout: bool,
	last_sequence: u8,
	sequence_gaps: u32,
}

impl VicpClient {

	pub fn new(ip:&str, port:u16) -> Self {
		Self{ ip: ip.to_owned(), port, stream: None, timeout: DEFAULT_TIMEOUT, remote: false, lockout: false, last_sequence: 0, sequence_gaps: 0 }
	}

	pub fn peer(&self) -> (&str, u16) { (&self.ip, self.port) }
	pub fn is_connected(&self) -> bool { self.stream.is_some() }

	pub fn timeout(&self) -> Duration { self.timeout }
	pub fn set_timeout(&mut self, timeout:Duration) { self.timeout = timeout; }

	// REMOTE and LOCKOUT ride along on every outgoing data block
	pub fn set_remote(&mut self, remote:bool) { self.remote = remote; }
	pub fn set_lockout(&mut self, lockout:bool) { self.lockout = lockout; }

	pub fn sequence_gaps(&self) -> u32 { self.sequence_gaps }

	fn stream(&self) -> io::Result<&TcpStream> {
		self.stream.as_ref().ok_or(Error::new(ErrorKind::NotConnected, "VICP client has no open socket"))
	}

	pub fn connect(&mut self, timeout:Duration) -> bool {
		debug!("vicp connect to {}:{} (timeout={:?})", self.ip, self.port, timeout);

		// Always start from scratch, a previous attempt may have left a socket behind
		self.disconnect();

		let addr:SocketAddr = match (self.ip.as_str(), self.port).to_socket_addrs().map(|mut addrs| addrs.next()) {
			Ok(Some(addr)) => addr,
			Ok(None) => {
				error!("vicp connect: {} did not resolve to any address", self.ip);
				return false;
			},
			Err(e) => {
				error!("vicp connect: unable to resolve {}: {}", self.ip, e);
				return false;
			},
		};

		let start = Instant::now();
		loop {
			let remaining:Duration = timeout.checked_sub(start.elapsed()).unwrap_or(MIN_IO_TIMEOUT);
			let attempt:Duration   = remaining.min(CONNECT_POLL_INTERVAL).max(MIN_IO_TIMEOUT);

			match TcpStream::connect_timeout(&addr, attempt) {
				Ok(stream) => {
					if let Err(e) = stream.set_nodelay(true) {
						warn!("vicp connect: unable to disable Nagle: {}", e);
					}
					self.stream = Some(stream);
					self.last_sequence = 0;
					self.sequence_gaps = 0;
					debug!("vicp connected to {}", addr);
					return true;
				},
				Err(ref e) if is_timeout(e) => {
					if start.elapsed() >= timeout {
						error!("vicp connect to {} timed out after {:?}", addr, start.elapsed());
						return false;
					}
				},
				Err(e) => {
					error!("vicp connect to {} failed: {}", addr, e);
					return false;
				},
			}
		}
	}

	pub fn disconnect(&mut self) {
		if let Some(stream) = self.stream.take() {
			debug!("vicp disconnect from {}:{}", self.ip, self.port);
			// Closing happens when the stream drops, a failed shutdown changes nothing for us
			let _ = stream.shutdown(Shutdown::Both);
		}
	}

	pub fn send(&mut self, data:&str) -> io::Result<bool> {
		debug!("sending data: {}", data);
		self.send_raw(data.as_bytes(), true)
	}

	pub fn send_raw(&mut self, data:&[u8], eoi:bool) -> io::Result<bool> {
		// Anything still waiting on the socket belongs to an earlier exchange
		self.flush()?;

		let mut operation = Operation::DATA;
		operation.set(Operation::REMOTE, self.remote);
		operation.set(Operation::LOCKOUT, self.lockout);
		operation.set(Operation::EOI, eoi);

		self.write_frame(operation, data)
	}

	pub fn receive(&mut self) -> io::Result<Vec<u8>> {
		self.receive_message().map(|reception| reception.data)
	}

	pub fn receive_message(&mut self) -> io::Result<Reception> {
		let mut data:Vec<u8> = vec![];
		trace!("receiving");

		loop {
			match self.read_frame()? {
				Some((header, mut payload)) => {
					data.append(&mut payload);
					if header.is_eoi() {
						debug!("got EOI, {} bytes received", data.len());
						return Ok(Reception{ data, terminated: true });
					}
				},
				None => {
					debug!("receive ended without EOI, {} bytes received", data.len());
					return Ok(Reception{ data, terminated: false });
				},
			}
		}
	}

	pub fn flush(&mut self) -> io::Result<()> {
		let mut discarded:usize = 0;

		while self.wait_readable(Duration::from_secs(0))? {
			match self.read_frame()? {
				Some((header, payload)) => {
					discarded += HEADER_LEN + payload.len();
					if header.is_eoi() { break; }
				},
				None => break,
			}
		}

		if discarded > 0 { warn!("flushed {} stale bytes", discarded); }
		Ok(())
	}

	pub fn device_clear(&mut self) -> io::Result<bool> {
		debug!("device clear");
		if !self.write_frame(Operation::CLEAR | Operation::EOI, &[])? {
			return Ok(false);
		}

		// The instrument answers a clear, drop whatever it says
		let reply:Vec<u8> = self.receive()?;
		trace!("device clear reply: {:?}", reply);
		Ok(true)
	}

	pub fn serial_poll(&mut self) -> io::Result<Option<u8>> {
		self.flush()?;
		if !self.write_frame(Operation::SERIALPOLL | Operation::EOI, &[])? {
			return Ok(None);
		}

		let reply:Vec<u8> = self.receive()?;
		debug!("serial poll reply: {:?}", reply);
		Ok(reply.first().copied())
	}

	fn write_frame(&mut self, operation:Operation, payload:&[u8]) -> io::Result<bool> {
		let frame:Vec<u8> = pack_frame(operation, TX_SEQUENCE, payload)?;

		let mut stream = self.stream()?;
		stream.set_write_timeout(Some(self.timeout.max(MIN_IO_TIMEOUT)))?;

		// A short write leaves the stream in an unknown state, so anything but the full frame is a failure
		match stream.write_all(&frame) {
			Ok(()) => {
				debug!("sent {} bytes ({})", frame.len(), operation);
				Ok(true)
			},
			Err(e) => {
				error!("error sending data: {}", e);
				Ok(false)
			},
		}
	}

	// None means the socket was not ready within the timeout
	fn read_frame(&mut self) -> io::Result<Option<(Header, Vec<u8>)>> {
		if !self.wait_readable(self.timeout)? {
			error!("socket not ready to receive header");
			return Ok(None);
		}

		let mut head:[u8; HEADER_LEN] = [0; HEADER_LEN];
		if !self.read_exact_within(&mut head)? {
			error!("incomplete header received");
			return Ok(None);
		}

		let header = Header::unpack(&head)?;
		debug!("header: {} version={} seq={} block_size={}", header.operation, header.version, header.sequence, header.block_size);

		let len:usize = header.payload_len()?;
		let mut payload:Vec<u8> = vec![];
		if len > 0 {
			if !self.wait_readable(self.timeout)? || !self.read_payload_within(len, &mut payload)? {
				error!("socket not ready to receive data, block size {} ({} bytes arrived)", header.block_size, payload.len());
				return Ok(None);
			}
			trace!("data: {:?}", payload);
		}

		self.track_sequence(header.sequence);
		Ok(Some((header, payload)))
	}

	fn wait_readable(&self, timeout:Duration) -> io::Result<bool> {
		let stream = self.stream()?;
		let mut first:[u8; 1] = [0];

		let peeked = if timeout == Duration::from_secs(0) {
			stream.set_nonblocking(true)?;
			let res = stream.peek(&mut first);
			stream.set_nonblocking(false)?;
			res
		} else {
			stream.set_read_timeout(Some(timeout))?;
			stream.peek(&mut first)
		};

		match peeked {
			Ok(0) => {
				warn!("peer closed the connection");
				Err(Error::new(ErrorKind::ConnectionAborted, "VICP peer closed the connection"))
			},
			Ok(_) => Ok(true),
			Err(ref e) if is_timeout(e) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn read_exact_within(&self, buff:&mut [u8]) -> io::Result<bool> {
		let mut stream = self.stream()?;
		stream.set_read_timeout(Some(self.timeout.max(MIN_IO_TIMEOUT)))?;

		match stream.read_exact(buff) {
			Ok(()) => Ok(true),
			Err(ref e) if is_timeout(e) || e.kind() == ErrorKind::UnexpectedEof => Ok(false),
			Err(e) => Err(e),
		}
	}

	// The buffer grows as bytes arrive rather than trusting the header's block size up front
	fn read_payload_within(&self, len:usize, payload:&mut Vec<u8>) -> io::Result<bool> {
		let stream = self.stream()?;
		stream.set_read_timeout(Some(self.timeout.max(MIN_IO_TIMEOUT)))?;

		payload.reserve(len.min(PAYLOAD_CHUNK));
		match stream.take(len as u64).read_to_end(payload) {
			Ok(_) => Ok(payload.len() == len),
			Err(ref e) if is_timeout(e) => Ok(false),
			Err(e) => Err(e),
		}
	}

	// Sequence numbers run 1..255 and wrap back to 1.  Gaps get noted but never acted on.
	fn track_sequence(&mut self, sequence:u8) {
		let expected:u8 = if self.last_sequence == 255 { 1 } else { self.last_sequence + 1 };
		if self.last_sequence != 0 && sequence != expected {
			debug!("sequence gap: expected {} but got {}", expected, sequence);
			self.sequence_gaps += 1;
		}
		self.last_sequence = sequence;
	}

}

impl Drop for VicpClient {

	fn drop(&mut self) { self.disconnect(); }

}
