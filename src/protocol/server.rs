use std::io::{
	self,
	Read,
	Write,
};

use crate::bus::{
	Address,
	PAGE_SIZE,
	Page,
	Sequencer,
};
use crate::gpio::GpioPort;

use super::{
	CMD_PARK,
	CMD_READ,
	CMD_SET_EXTENDED,
	CMD_WRITE_BYTE,
	CMD_WRITE_PAGE,
};

// the numeric scan needs one byte of lookahead, everything else reads
// exact counts
struct ByteStream<R> {
	input: R,
	pushback: Option<u8>,
}

impl<R: Read> ByteStream<R> {
	fn new(input: R) -> Self {
		ByteStream {
			input,
			pushback: None,
		}
	}

	/// `Ok(None)` on a clean end of stream.
	fn next(&mut self) -> io::Result<Option<u8>> {
		if let Some(byte) = self.pushback.take() {
			return Ok(Some(byte));
		}
		let mut buf = [0u8; 1];
		loop {
			match self.input.read(&mut buf) {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(buf[0])),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
	}

	fn unread(&mut self, byte: u8) {
		debug_assert!(self.pushback.is_none());
		self.pushback = Some(byte);
	}

	// a command's argument payload; the stream ending inside it leaves no
	// way to tell arguments from the next opcode
	fn exact(&mut self, buf: &mut [u8]) -> crate::AResult<()> {
		for slot in buf.iter_mut() {
			match self.next()? {
				Some(byte) => *slot = byte,
				None => bail!("input ended inside a command's argument bytes"),
			}
		}
		Ok(())
	}
}

/// Scans an unsigned decimal number the way the diagnostic opcode expects:
/// leading whitespace is skipped, digits accumulate with 32-bit wraparound,
/// no digits at all reads as 0. One terminating whitespace byte is
/// consumed; any other terminator is left for the dispatcher as the next
/// opcode.
fn scan_decimal<R: Read>(stream: &mut ByteStream<R>) -> crate::AResult<u32> {
	let mut byte = loop {
		match stream.next()? {
			Some(b) if b.is_ascii_whitespace() => (),
			Some(b) => break b,
			None => bail!("input ended inside a numeric argument"),
		}
	};
	let mut value = 0u32;
	while byte.is_ascii_digit() {
		value = value.wrapping_mul(10).wrapping_add(u32::from(byte - b'0'));
		byte = match stream.next()? {
			Some(b) => b,
			None => return Ok(value),
		};
	}
	if !byte.is_ascii_whitespace() {
		stream.unread(byte);
	}
	Ok(value)
}

/// Runs the dispatch loop until the input reaches its end: read one opcode
/// byte and its fixed argument payload, run the transaction, respond. Each
/// response is flushed before the next opcode is read.
///
/// Unknown opcodes are echoed and consume no argument bytes. The loop only
/// fails on transport errors or on a stream that ends mid-command.
pub fn serve<P, R, W>(seq: &mut Sequencer<P>, input: R, output: W) -> crate::AResult<()>
where
	P: GpioPort,
	R: Read,
	W: Write,
{
	let mut input = ByteStream::new(input);
	let mut output = output;
	loop {
		let opcode = match input.next()? {
			Some(byte) => byte,
			None => {
				debug!("end of command stream");
				return Ok(());
			},
		};
		match opcode {
			CMD_PARK => {
				let mut args = [0u8; 3];
				input.exact(&mut args)?;
				seq.park(Address::new(args[0], args[1], args[2]));
				output.write_all(b"l\n")?;
			},
			CMD_READ => {
				let mut args = [0u8; 3];
				input.exact(&mut args)?;
				let value = seq.read(Address::new(args[0], args[1], args[2]));
				output.write_all(&[b'r', b':', b' ', b'\'', value, b'\'', b'\n'])?;
			},
			CMD_SET_EXTENDED => {
				let value = scan_decimal(&mut input)?;
				seq.set_extended(value as u16);
				writeln!(output, "s: '{}'", value)?;
			},
			CMD_WRITE_BYTE => {
				let mut args = [0u8; 4];
				input.exact(&mut args)?;
				seq.write_byte(Address::new(args[0], args[1], args[2]), args[3]);
				output.write_all(b"a\n")?;
			},
			CMD_WRITE_PAGE => {
				let mut head = [0u8; 2];
				input.exact(&mut head)?;
				let mut data = [0u8; PAGE_SIZE];
				input.exact(&mut data)?;
				seq.write_page(
					Page {
						bank: head[0],
						high: head[1],
					},
					&data,
				);
				output.write_all(b"a\n")?;
			},
			other => {
				warn!("unknown opcode 0x{:02x}", other);
				output.write_all(&[b' ', b'-', b' ', other, b'\n'])?;
			},
		}
		output.flush()?;
	}
}

#[cfg(test)]
mod test {
	use crate::bus::{
		PinMap,
		Sequencer,
		Timing,
	};
	use crate::sim::SimBus;

	use super::serve;

	fn run(sim: &mut SimBus, input: &[u8]) -> crate::AResult<Vec<u8>> {
		let mut seq = Sequencer::new(&mut *sim, PinMap::default(), Timing::immediate());
		seq.init();
		let mut output = Vec::new();
		serve(&mut seq, input, &mut output)?;
		Ok(output)
	}

	#[test]
	fn read_command() {
		let mut sim = SimBus::new(PinMap::default());
		sim.preload(0x00_002a, 0x99);
		let output = run(&mut sim, b"r\x00\x00\x2a").unwrap();
		assert_eq!(&output[..], &b"r: '\x99'\n"[..]);
		assert_eq!(sim.reads(), [0x00_002a]);
		assert_eq!(sim.faults(), &[] as &[String]);
	}

	#[test]
	fn write_command() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"w\x01\x02\x03\xff").unwrap();
		assert_eq!(&output[..], &b"a\n"[..]);
		assert_eq!(sim.peek(0x01_0203), 0xff);
		assert_eq!(sim.writes(), [(0x01_0203, 0xff)]);
		assert_eq!(sim.faults(), &[] as &[String]);
	}

	#[test]
	fn park_command() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"l\x00\x00\x05").unwrap();
		assert_eq!(&output[..], &b"l\n"[..]);
		assert_eq!(sim.reads(), [0x00_0005]);
		assert!(sim.writes().is_empty());
	}

	#[test]
	fn page_write_command() {
		let mut sim = SimBus::new(PinMap::default());
		let mut input = vec![b'W', 0x02, 0x03];
		for i in 0..256 {
			input.push(i as u8);
		}
		let output = run(&mut sim, &input).unwrap();
		assert_eq!(&output[..], &b"a\n"[..]);
		for i in 0..256u32 {
			assert_eq!(sim.peek(0x02_0300 + i), i as u8);
		}
		assert_eq!(sim.faults(), &[] as &[String]);
	}

	#[test]
	fn set_extended_command() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"s70000\n").unwrap();
		assert_eq!(&output[..], &b"s: '70000'\n"[..]);
		// latched register only keeps the low 16 bits
		assert_eq!(sim.latched_value(), (70000 % 0x1_0000) as u16);
	}

	#[test]
	fn set_extended_with_leading_space() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"s 1234\n").unwrap();
		assert_eq!(&output[..], &b"s: '1234'\n"[..]);
		assert_eq!(sim.latched_value(), 1234);
	}

	#[test]
	fn set_extended_without_digits() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"sx").unwrap();
		// the terminator is not consumed, it dispatches as an opcode
		assert_eq!(&output[..], &b"s: '0'\n - x\n"[..]);
	}

	#[test]
	fn unknown_opcode_consumes_nothing() {
		let mut sim = SimBus::new(PinMap::default());
		sim.preload(0, 0x41);
		let output = run(&mut sim, b"\x99r\x00\x00\x00").unwrap();
		assert_eq!(&output[..], &b" - \x99\nr: 'A'\n"[..]);
	}

	#[test]
	fn empty_input_ends_cleanly() {
		let mut sim = SimBus::new(PinMap::default());
		let output = run(&mut sim, b"").unwrap();
		assert!(output.is_empty());
	}

	#[test]
	fn truncated_arguments_fail() {
		let mut sim = SimBus::new(PinMap::default());
		assert!(run(&mut sim, b"r\x00").is_err());
		assert!(run(&mut sim, b"w\x00\x00\x00").is_err());
		assert!(run(&mut sim, b"W\x00").is_err());
	}
}
