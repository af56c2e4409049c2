use crate::gpio::{
	GpioPort,
	PinDirection,
};

use super::PinMap;

/// All pin-level access to the bus goes through this type; in particular
/// it owns the cached data-bus direction, which stays valid only as long
/// as nothing else reconfigures those pins.
pub struct Pins<P: GpioPort> {
	port: P,
	map: PinMap,
	// starts unknown so the first set always reaches the hardware
	data_dir: Option<PinDirection>,
}

impl<P: GpioPort> Pins<P> {
	pub fn new(port: P, map: PinMap) -> Self {
		Pins {
			port,
			map,
			data_dir: None,
		}
	}

	pub fn map(&self) -> &PinMap {
		&self.map
	}

	/// One-time setup: control lines become outputs at their idle levels,
	/// both buses are left released (inputs, register outputs disabled).
	pub fn init(&mut self) {
		let control = [
			self.map.read_strobe,
			self.map.write_strobe,
			self.map.shift_data,
			self.map.shift_clock,
			self.map.shift_latch,
			self.map.shift_output_enable_n,
		];
		for &pin in &control {
			self.port.set_direction(pin, PinDirection::Output);
		}
		self.set_read_strobe(false);
		self.set_write_strobe(false);
		self.set_shift_data(false);
		self.set_shift_clock(false);
		self.set_shift_latch(false);
		self.set_extended_output_enabled(false);
		self.set_address_direction(PinDirection::Input);
		self.set_data_direction(PinDirection::Input);
	}

	/// Address direction is switched on every transaction and the switch
	/// is always meaningful, so it is applied unconditionally.
	pub fn set_address_direction(&mut self, dir: PinDirection) {
		trace!("address bus -> {:?}", dir);
		for bit in 0..8 {
			self.port.set_direction(self.map.address[bit], dir);
		}
	}

	pub fn set_data_direction(&mut self, dir: PinDirection) {
		if self.data_dir == Some(dir) {
			return;
		}
		trace!("data bus -> {:?}", dir);
		for bit in 0..8 {
			self.port.set_direction(self.map.data[bit], dir);
		}
		self.data_dir = Some(dir);
	}

	/// Only meaningful while the address bus is an output.
	pub fn write_address_bus(&mut self, value: u8) {
		for bit in 0..8 {
			self.port.write(self.map.address[bit], 0 != value & (1 << bit));
		}
	}

	/// Only meaningful while the data bus is an output.
	pub fn write_data_bus(&mut self, value: u8) {
		for bit in 0..8 {
			self.port.write(self.map.data[bit], 0 != value & (1 << bit));
		}
	}

	/// Only meaningful while the data bus is an input.
	pub fn read_data_bus(&mut self) -> u8 {
		let mut value = 0u8;
		for bit in 0..8 {
			if self.port.read(self.map.data[bit]) {
				value |= 1 << bit;
			}
		}
		value
	}

	pub fn set_read_strobe(&mut self, asserted: bool) {
		self.port.write(self.map.read_strobe, asserted);
	}

	pub fn set_write_strobe(&mut self, asserted: bool) {
		self.port.write(self.map.write_strobe, asserted);
	}

	/// The register's output enable is active low; enabled drives the
	/// line low, disabled lets the extended address bus float.
	pub fn set_extended_output_enabled(&mut self, enabled: bool) {
		self.port.write(self.map.shift_output_enable_n, !enabled);
	}

	pub(super) fn set_shift_data(&mut self, level: bool) {
		self.port.write(self.map.shift_data, level);
	}

	pub(super) fn set_shift_clock(&mut self, level: bool) {
		self.port.write(self.map.shift_clock, level);
	}

	pub(super) fn set_shift_latch(&mut self, level: bool) {
		self.port.write(self.map.shift_latch, level);
	}
}

#[cfg(test)]
mod test {
	use crate::bus::PinMap;
	use crate::gpio::PinDirection;
	use crate::sim::SimBus;

	use super::Pins;

	#[test]
	fn init_establishes_released_idle() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		Pins::new(&mut sim, map.clone()).init();

		assert_eq!(sim.level(map.read_strobe), false);
		assert_eq!(sim.level(map.write_strobe), false);
		assert_eq!(sim.level(map.shift_clock), false);
		assert_eq!(sim.level(map.shift_data), false);
		assert_eq!(sim.level(map.shift_latch), false);
		// active low: disabled is driven high
		assert_eq!(sim.level(map.shift_output_enable_n), true);
		for bit in 0..8 {
			assert_eq!(sim.direction(map.address[bit]), PinDirection::Input, "a{}", bit);
			assert_eq!(sim.direction(map.data[bit]), PinDirection::Input, "d{}", bit);
		}
	}

	#[test]
	fn data_direction_cache_elides_repeats() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		Pins::new(&mut sim, map.clone()).init();

		for &dir in &[PinDirection::Output, PinDirection::Input] {
			sim.reset_trace();
			{
				let mut pins = Pins::new(&mut sim, map.clone());
				pins.set_data_direction(dir);
				pins.set_data_direction(dir);
			}
			for bit in 0..8 {
				assert_eq!(sim.direction_sets(map.data[bit]), 1, "d{} for {:?}", bit, dir);
			}
		}
	}

	#[test]
	fn address_direction_is_uncached() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		Pins::new(&mut sim, map.clone()).init();

		sim.reset_trace();
		{
			let mut pins = Pins::new(&mut sim, map.clone());
			pins.set_address_direction(PinDirection::Output);
			pins.set_address_direction(PinDirection::Output);
		}
		for bit in 0..8 {
			assert_eq!(sim.direction_sets(map.address[bit]), 2, "a{}", bit);
		}
	}

	#[test]
	fn bus_bytes_map_lsb_first() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		Pins::new(&mut sim, map.clone()).init();

		{
			let mut pins = Pins::new(&mut sim, map.clone());
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0xa5);
		}
		for bit in 0..8 {
			assert_eq!(sim.level(map.address[bit]), 0 != 0xa5 & (1 << bit), "a{}", bit);
		}
	}
}
