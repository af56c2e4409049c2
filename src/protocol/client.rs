use std::io::{
	Read,
	Write,
};

use crate::bus::{
	Address,
	PAGE_SIZE,
	Page,
};

use super::{
	CMD_PARK,
	CMD_READ,
	CMD_SET_EXTENDED,
	CMD_WRITE_BYTE,
	CMD_WRITE_PAGE,
};

/// Host side of the link: sends one command per call and blocks until the
/// dispatcher's response line arrives.
///
/// Response bytes are checked against the expected line; a mismatch means
/// the two sides disagree about argument counts and the stream cannot be
/// trusted afterwards.
pub struct Remote<S: Read + Write> {
	stream: S,
}

impl<S: Read + Write> Remote<S> {
	pub fn new(stream: S) -> Self {
		Remote {
			stream,
		}
	}

	fn command(&mut self, bytes: &[u8]) -> crate::AResult<()> {
		self.stream.write_all(bytes)?;
		self.stream.flush()?;
		Ok(())
	}

	fn response_byte(&mut self) -> crate::AResult<u8> {
		let mut buf = [0u8; 1];
		self.stream.read_exact(&mut buf)?;
		Ok(buf[0])
	}

	fn expect_response(&mut self, expected: &[u8]) -> crate::AResult<()> {
		for &want in expected {
			let got = self.response_byte()?;
			ensure!(
				got == want,
				"link desynchronized: expected response byte 0x{:02x}, got 0x{:02x}",
				want,
				got
			);
		}
		Ok(())
	}

	pub fn park(&mut self, addr: Address) -> crate::AResult<()> {
		self.command(&[CMD_PARK, addr.page.bank, addr.page.high, addr.low])?;
		self.expect_response(b"l\n")
	}

	pub fn read(&mut self, addr: Address) -> crate::AResult<u8> {
		self.command(&[CMD_READ, addr.page.bank, addr.page.high, addr.low])?;
		self.expect_response(b"r: '")?;
		let value = self.response_byte()?;
		self.expect_response(b"'\n")?;
		Ok(value)
	}

	pub fn write_byte(&mut self, addr: Address, value: u8) -> crate::AResult<()> {
		self.command(&[CMD_WRITE_BYTE, addr.page.bank, addr.page.high, addr.low, value])?;
		self.expect_response(b"a\n")
	}

	pub fn write_page(&mut self, page: Page, data: &[u8; PAGE_SIZE]) -> crate::AResult<()> {
		self.command(&[CMD_WRITE_PAGE, page.bank, page.high])?;
		self.stream.write_all(data)?;
		self.stream.flush()?;
		self.expect_response(b"a\n")
	}

	pub fn set_extended(&mut self, value: u16) -> crate::AResult<()> {
		self.command(format!("{}{}\n", CMD_SET_EXTENDED as char, value).as_bytes())?;
		self.expect_response(format!("s: '{}'\n", value).as_bytes())
	}

	/// Writes `data` page by page starting at `start`; a partial final
	/// page is padded with 0xff, the erased state of EPROM-class parts.
	pub fn upload(&mut self, start: Page, data: &[u8]) -> crate::AResult<()> {
		let pages = (data.len() + PAGE_SIZE - 1) / PAGE_SIZE;
		info!(
			"uploading {} bytes in {} pages starting at {}",
			data.len(),
			pages,
			start
		);
		let mut page = Some(start);
		for chunk in data.chunks(PAGE_SIZE) {
			let current = match page {
				Some(p) => p,
				None => bail!("image runs past the end of the address space"),
			};
			let mut buf = [0xffu8; PAGE_SIZE];
			buf[..chunk.len()].copy_from_slice(chunk);
			self.write_page(current, &buf)?;
			debug!("wrote page {}", current);
			page = current.next();
		}
		Ok(())
	}

	/// Reads back `data.len()` bytes from `start` and compares. Padding
	/// written by `upload` is not checked.
	pub fn verify(&mut self, start: Page, data: &[u8]) -> crate::AResult<()> {
		let base = Address {
			page: start,
			low: 0,
		};
		ensure!(
			u64::from(base.linear()) + data.len() as u64 <= 1 << 24,
			"verify range runs past the end of the address space"
		);
		for (i, &expected) in data.iter().enumerate() {
			let addr = Address::from_linear(base.linear() + i as u32)?;
			let got = self.read(addr)?;
			ensure!(
				got == expected,
				"verify mismatch at {}: wrote 0x{:02x}, read back 0x{:02x}",
				addr,
				expected,
				got
			);
		}
		info!("verified {} bytes from {}", data.len(), base);
		Ok(())
	}

	/// Streams `length` bytes starting at `start` into `output`.
	pub fn dump<W: Write>(
		&mut self,
		start: Address,
		length: u32,
		output: &mut W,
	) -> crate::AResult<()> {
		ensure!(
			u64::from(start.linear()) + u64::from(length) <= 1 << 24,
			"dump range runs past the end of the address space"
		);
		for i in 0..length {
			let value = self.read(Address::from_linear(start.linear() + i)?)?;
			output.write_all(&[value])?;
		}
		Ok(())
	}
}
