use std::fmt;
use std::ops::{
	Deref,
	DerefMut,
};
use std::str;

use crate::gpio::{
	GpioPort,
	PinDirection,
};

use super::timing::hold;
use super::{
	PinMap,
	Pins,
	Timing,
};

/// Bytes a single page write covers; also the page alignment.
pub const PAGE_SIZE: usize = 256;

/// Upper 16 address bits, loaded into the extender register as
/// `(bank << 8) | high`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Page {
	pub bank: u8,
	pub high: u8,
}

impl Page {
	pub fn extended(self) -> u16 {
		(u16::from(self.bank) << 8) | u16::from(self.high)
	}

	/// The following page, or `None` past the end of the address space.
	pub fn next(self) -> Option<Page> {
		let extended = self.extended().checked_add(1)?;
		Some(Page {
			bank: (extended >> 8) as u8,
			high: extended as u8,
		})
	}
}

impl fmt::Display for Page {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:02x}:{:02x}xx", self.bank, self.high)
	}
}

/// Full 24-bit location: extended page plus the directly driven low byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Address {
	pub page: Page,
	pub low: u8,
}

impl Address {
	pub fn new(bank: u8, high: u8, low: u8) -> Self {
		Address {
			page: Page {
				bank,
				high,
			},
			low,
		}
	}

	pub fn from_linear(linear: u32) -> crate::AResult<Self> {
		ensure!(linear < 1 << 24, "address 0x{:x} outside the 24-bit space", linear);
		Ok(Address::new((linear >> 16) as u8, (linear >> 8) as u8, linear as u8))
	}

	pub fn linear(self) -> u32 {
		(u32::from(self.page.bank) << 16) | (u32::from(self.page.high) << 8) | u32::from(self.low)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:02x}:{:02x}{:02x}", self.page.bank, self.page.high, self.low)
	}
}

fn parse_number(s: &str) -> crate::AResult<u32> {
	let value = if s.starts_with("0x") || s.starts_with("0X") {
		u32::from_str_radix(&s[2..], 16)?
	} else {
		s.parse()?
	};
	Ok(value)
}

/// Accepts a linear number (`73`, `0x12abc`) or the hex split form
/// `bank:offset` (`02:1a2b`).
impl str::FromStr for Address {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		with_context!(("invalid address: {:?}", s), {
			let mut parts = s.splitn(2, ':');
			let first = parts.next().unwrap_or("");
			match parts.next() {
				Some(offset) => {
					let bank = u8::from_str_radix(first, 16)?;
					let offset = u16::from_str_radix(offset, 16)?;
					Ok(Address::new(bank, (offset >> 8) as u8, offset as u8))
				},
				None => Address::from_linear(parse_number(s)?),
			}
		})
	}
}

/// Runs complete transactions against the device on the bus.
///
/// Every operation drives the bus only for its own duration and leaves it
/// released afterwards (see the module docs). `set_extended` is the one
/// exception: it deliberately leaves the register outputs enabled.
pub struct Sequencer<P: GpioPort> {
	pins: Pins<P>,
	timing: Timing,
}

impl<P: GpioPort> Sequencer<P> {
	pub fn new(port: P, map: PinMap, timing: Timing) -> Self {
		Sequencer {
			pins: Pins::new(port, map),
			timing,
		}
	}

	/// Must run once before the first transaction.
	pub fn init(&mut self) {
		self.pins.init();
	}

	// deassert strobes, then latch the page into the extender and enable
	// its outputs; the guard returns the bus to the released state
	fn drive(&mut self, page: Page) -> Driven<P> {
		let mut bus = Driven(&mut self.pins);
		bus.set_read_strobe(false);
		bus.set_write_strobe(false);
		bus.set_extended_address(page.extended());
		bus.set_extended_output_enabled(true);
		bus
	}

	pub fn read(&mut self, addr: Address) -> u8 {
		let mut bus = self.drive(addr.page);
		bus.set_address_direction(PinDirection::Output);
		bus.write_address_bus(addr.low);
		bus.set_data_direction(PinDirection::Input);
		bus.set_read_strobe(true);
		let value = bus.read_data_bus();
		bus.set_read_strobe(false);
		debug!("read {} -> 0x{:02x}", addr, value);
		value
	}

	pub fn write_byte(&mut self, addr: Address, value: u8) {
		debug!("write {} <- 0x{:02x}", addr, value);
		let pulse = self.timing.write_pulse;
		let mut bus = self.drive(addr.page);
		bus.set_address_direction(PinDirection::Output);
		bus.write_address_bus(addr.low);
		bus.set_data_direction(PinDirection::Output);
		bus.write_data_bus(value);
		bus.set_write_strobe(true);
		hold(pulse);
		bus.set_write_strobe(false);
	}

	/// One extender load covers all 256 bytes; addresses walk the page in
	/// ascending order with the same write pulse as single-byte writes.
	pub fn write_page(&mut self, page: Page, data: &[u8; PAGE_SIZE]) {
		debug!("write page {}", page);
		let pulse = self.timing.write_pulse;
		let mut bus = self.drive(page);
		bus.set_address_direction(PinDirection::Output);
		bus.set_data_direction(PinDirection::Output);
		for (low, value) in data.iter().enumerate() {
			bus.write_address_bus(low as u8);
			bus.write_data_bus(*value);
			bus.set_write_strobe(true);
			hold(pulse);
			bus.set_write_strobe(false);
		}
	}

	/// Presents the address with the read strobe asserted for the
	/// configured hold, long enough for an analyzer on the bus to trigger
	/// on a stable cycle. No data is transferred.
	pub fn park(&mut self, addr: Address) {
		debug!("park at {}", addr);
		let hold_for = self.timing.park_hold;
		let mut bus = self.drive(addr.page);
		bus.set_address_direction(PinDirection::Output);
		bus.write_address_bus(addr.low);
		bus.set_data_direction(PinDirection::Input);
		bus.set_read_strobe(true);
		hold(hold_for);
		bus.set_read_strobe(false);
	}

	/// Raw access to the extender register, bypassing the transaction
	/// discipline: the value stays latched and the register outputs stay
	/// enabled after returning.
	pub fn set_extended(&mut self, value: u16) {
		debug!("extended register <- 0x{:04x}", value);
		self.pins.set_extended_address(value);
		self.pins.set_extended_output_enabled(true);
	}
}

struct Driven<'a, P: GpioPort+'a>(&'a mut Pins<P>);

impl<'a, P: GpioPort> Drop for Driven<'a, P> {
	fn drop(&mut self) {
		self.0.set_data_direction(PinDirection::Input);
		self.0.set_address_direction(PinDirection::Input);
		self.0.set_extended_output_enabled(false);
		self.0.set_read_strobe(false);
		self.0.set_write_strobe(false);
	}
}

impl<'a, P: GpioPort> Deref for Driven<'a, P> {
	type Target = Pins<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, P: GpioPort> DerefMut for Driven<'a, P> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

#[cfg(test)]
mod test {
	use crate::bus::{
		Address,
		PAGE_SIZE,
		Page,
		PinMap,
		Sequencer,
		Timing,
	};
	use crate::gpio::PinDirection;
	use crate::sim::SimBus;

	fn setup(sim: &mut SimBus) -> Sequencer<&mut SimBus> {
		let mut seq = Sequencer::new(sim, PinMap::default(), Timing::immediate());
		seq.init();
		seq
	}

	fn check_parse(s: &str, linear: u32) {
		let addr: Address = s.parse().unwrap();
		assert_eq!(addr.linear(), linear, "parsing {:?}", s);
	}

	#[test]
	fn extended_combines_bank_and_high() {
		assert_eq!(Page { bank: 0x12, high: 0x34 }.extended(), 0x1234);
		assert_eq!(Page { bank: 0x00, high: 0x05 }.extended(), 0x0005);
		assert_eq!(Page { bank: 0x01, high: 0x00 }.extended(), 0x0100);
	}

	#[test]
	fn page_increment_carries_into_bank() {
		let next = Page { bank: 0x00, high: 0xff }.next();
		assert_eq!(next, Some(Page { bank: 0x01, high: 0x00 }));
		assert_eq!(Page { bank: 0xff, high: 0xff }.next(), None);
	}

	#[test]
	fn linear_split() {
		let addr = Address::from_linear(0x12_3456).unwrap();
		assert_eq!(addr.page.bank, 0x12);
		assert_eq!(addr.page.high, 0x34);
		assert_eq!(addr.low, 0x56);
		assert_eq!(addr.linear(), 0x12_3456);
		assert_eq!(addr.to_string(), "12:3456");
		assert!(Address::from_linear(0x100_0000).is_err());
	}

	#[test]
	fn parse_addresses() {
		check_parse("0", 0);
		check_parse("255", 255);
		check_parse("0x12345", 0x1_2345);
		check_parse("02:1a2b", 0x02_1a2b);
		check_parse("ff:ffff", 0xff_ffff);
		assert!("0x1000000".parse::<Address>().is_err());
		assert!("1:2:3".parse::<Address>().is_err());
		assert!("zz:0000".parse::<Address>().is_err());
		assert!("".parse::<Address>().is_err());
	}

	#[test]
	fn read_returns_device_byte_and_releases() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		sim.preload(0x02_1a2b, 0x5a);

		let value = {
			let mut seq = setup(&mut sim);
			seq.read(Address::from_linear(0x02_1a2b).unwrap())
		};
		assert_eq!(value, 0x5a);

		assert_eq!(sim.reads(), [0x02_1a2b]);
		assert_eq!(sim.faults(), &[] as &[String]);
		for bit in 0..8 {
			assert_eq!(sim.direction(map.data[bit]), PinDirection::Input, "d{}", bit);
			assert_eq!(sim.direction(map.address[bit]), PinDirection::Input, "a{}", bit);
		}
		assert_eq!(sim.level(map.read_strobe), false);
		assert_eq!(sim.level(map.write_strobe), false);
		assert_eq!(sim.level(map.shift_output_enable_n), true);
	}

	#[test]
	fn write_lands_at_address() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut seq = setup(&mut sim);
			seq.write_byte(Address::from_linear(0xff_00fe).unwrap(), 0xa7);
		}
		assert_eq!(sim.peek(0xff_00fe), 0xa7);
		// one entry in the log means exactly one strobe cycle
		assert_eq!(sim.writes(), [(0xff_00fe, 0xa7)]);
		assert_eq!(sim.faults(), &[] as &[String]);
		assert_eq!(sim.level(map.write_strobe), false);
		assert_eq!(sim.level(map.shift_output_enable_n), true);
		for bit in 0..8 {
			assert_eq!(sim.direction(map.data[bit]), PinDirection::Input, "d{}", bit);
		}
	}

	#[test]
	fn page_write_covers_ascending_addresses() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		let mut data = [0u8; PAGE_SIZE];
		for (i, value) in data.iter_mut().enumerate() {
			*value = (i as u8).wrapping_mul(7).wrapping_add(3);
		}
		{
			let mut seq = setup(&mut sim);
			seq.write_page(Page { bank: 0x01, high: 0x80 }, &data);
		}
		assert_eq!(sim.writes().len(), PAGE_SIZE);
		for (i, &(addr, value)) in sim.writes().iter().enumerate() {
			assert_eq!(addr, 0x01_8000 + i as u32);
			assert_eq!(value, data[i]);
			assert_eq!(sim.peek(addr), value);
		}
		assert_eq!(sim.faults(), &[] as &[String]);
	}

	#[test]
	fn page_write_flips_data_direction_once() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		setup(&mut sim);
		sim.reset_trace();
		{
			let mut seq = Sequencer::new(&mut sim, map.clone(), Timing::immediate());
			seq.write_page(Page { bank: 0x00, high: 0x01 }, &[0x55; PAGE_SIZE]);
		}
		assert_eq!(sim.writes().len(), PAGE_SIZE);
		// once to drive the bus, once back on release
		for bit in 0..8 {
			assert_eq!(sim.direction_sets(map.data[bit]), 2, "d{} direction sets", bit);
		}
		assert_eq!(sim.faults(), &[] as &[String]);
	}

	#[test]
	fn park_presents_address_then_releases() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut seq = setup(&mut sim);
			seq.park(Address::from_linear(0x03_0000).unwrap());
		}
		assert_eq!(sim.reads(), [0x03_0000]);
		assert!(sim.writes().is_empty());
		assert_eq!(sim.faults(), &[] as &[String]);
		assert_eq!(sim.level(map.shift_output_enable_n), true);
		for bit in 0..8 {
			assert_eq!(sim.direction(map.address[bit]), PinDirection::Input, "a{}", bit);
		}
	}

	#[test]
	fn set_extended_leaves_outputs_enabled() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut seq = setup(&mut sim);
			seq.set_extended(0xbeef);
		}
		assert_eq!(sim.latched_value(), 0xbeef);
		assert_eq!(sim.level(map.shift_output_enable_n), false);
	}
}
