//! In-process double of the programmer hardware: pin electricals, the
//! address extender register and a 16 MiB memory device, plus a trace of
//! everything observable at the connector.
//!
//! Backs the dispatcher's `--sim` mode and the test suite. Besides plain
//! behavior it checks the bus discipline: strobes against floating or
//! contended lines are recorded as faults instead of silently "working".

use std::collections::HashMap;

use crate::bus::PinMap;
use crate::gpio::{
	GpioPort,
	PinDirection,
	PinId,
};

const MEMORY_SIZE: usize = 1 << 24;

#[derive(Clone, Copy)]
struct SimPin {
	direction: PinDirection,
	driven: bool,
}

pub struct SimBus {
	map: PinMap,
	pins: HashMap<PinId, SimPin>,
	shifting: u16,
	latched: u16,
	memory: Box<[u8]>,
	// write cycle captured at the strobe rise, committed on the fall
	pending_write: Option<(u32, u8)>,
	clock_rises: u32,
	latch_rises: u32,
	direction_sets: HashMap<PinId, u32>,
	reads: Vec<u32>,
	writes: Vec<(u32, u8)>,
	faults: Vec<String>,
}

impl SimBus {
	pub fn new(map: PinMap) -> Self {
		let pins = map
			.pins()
			.into_iter()
			.map(|pin| {
				(pin, SimPin {
					direction: PinDirection::Input,
					driven: false,
				})
			})
			.collect();
		SimBus {
			map,
			pins,
			shifting: 0,
			latched: 0,
			// erased state of an EPROM-class part
			memory: vec![0xff; MEMORY_SIZE].into_boxed_slice(),
			pending_write: None,
			clock_rises: 0,
			latch_rises: 0,
			direction_sets: HashMap::new(),
			reads: Vec::new(),
			writes: Vec::new(),
			faults: Vec::new(),
		}
	}

	pub fn preload(&mut self, addr: u32, value: u8) {
		self.memory[addr as usize] = value;
	}

	pub fn peek(&self, addr: u32) -> u8 {
		self.memory[addr as usize]
	}

	/// Word currently committed to the extender's parallel outputs.
	pub fn latched_value(&self) -> u16 {
		self.latched
	}

	pub fn shift_clock_rises(&self) -> u32 {
		self.clock_rises
	}

	pub fn shift_latch_rises(&self) -> u32 {
		self.latch_rises
	}

	/// Addresses presented at each read strobe, in order.
	pub fn reads(&self) -> &[u32] {
		&self.reads
	}

	/// Committed write cycles as `(address, value)`, in order.
	pub fn writes(&self) -> &[(u32, u8)] {
		&self.writes
	}

	pub fn faults(&self) -> &[String] {
		&self.faults
	}

	/// Externally visible level of a line. Panics if the line is floating.
	pub fn level(&self, pin: PinId) -> bool {
		self.visible(pin).expect("line is floating")
	}

	pub fn direction(&self, pin: PinId) -> PinDirection {
		self.pin(pin).direction
	}

	/// How often the controller reconfigured the line since the last
	/// `reset_trace`, whether or not the direction actually changed.
	pub fn direction_sets(&self, pin: PinId) -> u32 {
		self.direction_sets.get(&pin).cloned().unwrap_or(0)
	}

	/// Clears counters and event logs. Pin, register and memory state stay.
	pub fn reset_trace(&mut self) {
		self.clock_rises = 0;
		self.latch_rises = 0;
		self.direction_sets.clear();
		self.reads.clear();
		self.writes.clear();
		self.faults.clear();
	}

	fn pin(&self, pin: PinId) -> SimPin {
		self.pins[&pin]
	}

	// level seen by the other parts on the bus: None while the controller
	// keeps the line as an input
	fn visible(&self, pin: PinId) -> Option<bool> {
		let state = self.pin(pin);
		match state.direction {
			PinDirection::Output => Some(state.driven),
			PinDirection::Input => None,
		}
	}

	fn fault(&mut self, message: String) {
		warn!("bus fault: {}", message);
		self.faults.push(message);
	}

	fn line_name(&self, pin: PinId) -> String {
		for bit in 0..8 {
			if self.map.address[bit] == pin {
				return format!("a{}", bit);
			}
			if self.map.data[bit] == pin {
				return format!("d{}", bit);
			}
		}
		format!("{}", pin)
	}

	// full 24-bit location selected on the bus; faults if an address line
	// is left floating
	fn selected_address(&mut self) -> Option<u32> {
		let mut low = 0u8;
		for bit in 0..8 {
			match self.visible(self.map.address[bit]) {
				Some(true) => low |= 1 << bit,
				Some(false) => (),
				None => {
					self.fault(format!("address line a{} floating during a strobe", bit));
					return None;
				},
			}
		}
		Some((u32::from(self.latched) << 8) | u32::from(low))
	}

	fn driven_data(&mut self) -> Option<u8> {
		let mut value = 0u8;
		for bit in 0..8 {
			match self.visible(self.map.data[bit]) {
				Some(true) => value |= 1 << bit,
				Some(false) => (),
				None => {
					self.fault(format!("data line d{} floating during a write", bit));
					return None;
				},
			}
		}
		Some(value)
	}

	fn read_rise(&mut self) {
		if self.visible(self.map.write_strobe) == Some(true) {
			self.fault("read and write strobes asserted together".to_string());
		}
		if self.visible(self.map.shift_output_enable_n) != Some(false) {
			self.fault("read strobe with extender outputs disabled".to_string());
			return;
		}
		for bit in 0..8 {
			if self.pin(self.map.data[bit]).direction == PinDirection::Output {
				self.fault(format!("data line d{} driven during a read", bit));
			}
		}
		if let Some(addr) = self.selected_address() {
			self.reads.push(addr);
		}
	}

	fn write_rise(&mut self) {
		self.pending_write = None;
		if self.visible(self.map.read_strobe) == Some(true) {
			self.fault("read and write strobes asserted together".to_string());
		}
		if self.visible(self.map.shift_output_enable_n) != Some(false) {
			self.fault("write strobe with extender outputs disabled".to_string());
			return;
		}
		let addr = match self.selected_address() {
			Some(addr) => addr,
			None => return,
		};
		let value = match self.driven_data() {
			Some(value) => value,
			None => return,
		};
		self.pending_write = Some((addr, value));
	}

	fn write_fall(&mut self) {
		if let Some((addr, value)) = self.pending_write.take() {
			self.memory[addr as usize] = value;
			self.writes.push((addr, value));
		}
	}

	fn transition(&mut self, pin: PinId, before: Option<bool>, after: Option<bool>) {
		if before == after {
			return;
		}
		let rose = before == Some(false) && after == Some(true);
		let map = self.map.clone();
		if pin == map.shift_clock {
			if rose {
				self.clock_rises += 1;
				match self.visible(map.shift_data) {
					Some(level) => self.shifting = (self.shifting << 1) | u16::from(level),
					None => self.fault("shift data floating at the clock edge".to_string()),
				}
			}
		} else if pin == map.shift_data {
			if self.visible(map.shift_clock) == Some(true) {
				self.fault("shift data changed while the clock is high".to_string());
			}
		} else if pin == map.shift_latch {
			if rose {
				self.latch_rises += 1;
				self.latched = self.shifting;
			}
		} else if pin == map.read_strobe {
			if rose {
				self.read_rise();
			}
		} else if pin == map.write_strobe {
			if rose {
				self.write_rise();
			} else if before == Some(true) {
				self.write_fall();
			}
		} else if self.visible(map.write_strobe) == Some(true)
			|| self.visible(map.read_strobe) == Some(true)
		{
			if map.address.contains(&pin) || map.data.contains(&pin) {
				let name = self.line_name(pin);
				self.fault(format!("{} changed during an active strobe", name));
			}
		}
	}
}

impl GpioPort for SimBus {
	fn set_direction(&mut self, pin: PinId, dir: PinDirection) {
		*self.direction_sets.entry(pin).or_insert(0) += 1;
		let before = self.visible(pin);
		self.pins.get_mut(&pin).expect("unmapped pin").direction = dir;
		let after = self.visible(pin);
		self.transition(pin, before, after);
	}

	fn write(&mut self, pin: PinId, level: bool) {
		let before = self.visible(pin);
		self.pins.get_mut(&pin).expect("unmapped pin").driven = level;
		let after = self.visible(pin);
		self.transition(pin, before, after);
	}

	fn read(&mut self, pin: PinId) -> bool {
		let state = self.pin(pin);
		if state.direction == PinDirection::Output {
			// readback of our own level
			return state.driven;
		}
		let bit = match self.map.data.iter().position(|&p| p == pin) {
			Some(bit) => bit,
			// floating non-data line; nothing drives it
			None => return false,
		};
		if self.visible(self.map.read_strobe) != Some(true) {
			self.fault(format!("data line d{} sampled without the read strobe", bit));
			return false;
		}
		match self.selected_address() {
			Some(addr) => 0 != self.memory[addr as usize] & (1 << bit),
			None => false,
		}
	}
}

#[cfg(test)]
mod test {
	use crate::bus::{
		PinMap,
		Pins,
	};
	use crate::gpio::PinDirection;

	use super::SimBus;

	#[test]
	fn memory_defaults_to_erased() {
		let mut sim = SimBus::new(PinMap::default());
		assert_eq!(sim.peek(0), 0xff);
		assert_eq!(sim.peek(0xff_ffff), 0xff);
		sim.preload(0x12_3456, 0x00);
		assert_eq!(sim.peek(0x12_3456), 0x00);
	}

	#[test]
	fn flags_write_with_outputs_disabled() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut pins = Pins::new(&mut sim, map);
			pins.init();
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0x10);
			pins.set_data_direction(PinDirection::Output);
			pins.write_data_bus(0x42);
			// extender outputs were never enabled
			pins.set_write_strobe(true);
			pins.set_write_strobe(false);
		}
		assert_eq!(sim.faults().len(), 1);
		assert!(sim.faults()[0].contains("outputs disabled"));
		assert!(sim.writes().is_empty());
	}

	#[test]
	fn flags_write_with_floating_data() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut pins = Pins::new(&mut sim, map);
			pins.init();
			pins.set_extended_address(0x0001);
			pins.set_extended_output_enabled(true);
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0x00);
			// data bus still released
			pins.set_write_strobe(true);
			pins.set_write_strobe(false);
		}
		assert_eq!(sim.faults().len(), 1);
		assert!(sim.faults()[0].contains("floating"));
		assert!(sim.writes().is_empty());
		assert_eq!(sim.peek(0x000_0100), 0xff);
	}

	#[test]
	fn flags_contention_on_read() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut pins = Pins::new(&mut sim, map);
			pins.init();
			pins.set_extended_address(0x0000);
			pins.set_extended_output_enabled(true);
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0x00);
			// wrong direction for a read
			pins.set_data_direction(PinDirection::Output);
			pins.set_read_strobe(true);
			pins.set_read_strobe(false);
		}
		assert!(!sim.faults().is_empty());
		assert!(sim.faults()[0].contains("driven during a read"));
	}

	#[test]
	fn flags_concurrent_strobes() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut pins = Pins::new(&mut sim, map);
			pins.init();
			pins.set_extended_address(0x0000);
			pins.set_extended_output_enabled(true);
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0x00);
			pins.set_read_strobe(true);
			pins.set_write_strobe(true);
			pins.set_write_strobe(false);
			pins.set_read_strobe(false);
		}
		assert!(sim
			.faults()
			.iter()
			.any(|fault| fault.contains("strobes asserted together")));
	}

	#[test]
	fn flags_address_change_during_strobe() {
		let map = PinMap::default();
		let mut sim = SimBus::new(map.clone());
		{
			let mut pins = Pins::new(&mut sim, map);
			pins.init();
			pins.set_extended_address(0x0000);
			pins.set_extended_output_enabled(true);
			pins.set_address_direction(PinDirection::Output);
			pins.write_address_bus(0x00);
			pins.set_data_direction(PinDirection::Input);
			pins.set_read_strobe(true);
			pins.write_address_bus(0xff);
			pins.set_read_strobe(false);
		}
		assert!(sim
			.faults()
			.iter()
			.any(|fault| fault.contains("changed during an active strobe")));
	}
}
