use crate::gpio::GpioPort;

use super::Pins;

/// Serial load of the address extender, a 74xx595-style register: bits go
/// out most significant first, the register samples the data line on each
/// rising clock edge, and a latch pulse afterwards commits the shifted
/// word to the parallel outputs. Data must only change while the clock is
/// low or the sampled word is corrupted.
///
/// No explicit settling delays: even bit-banged through sysfs, each edge
/// is orders of magnitude slower than the register's setup/hold times.
impl<P: GpioPort> Pins<P> {
	pub fn set_extended_address(&mut self, value: u16) {
		self.set_shift_latch(false);
		self.set_shift_data(false);
		for bit in (0..16).rev() {
			self.set_shift_clock(false);
			self.set_shift_data(0 != value & (1 << bit));
			self.set_shift_clock(true);
		}
		self.set_shift_clock(false);
		self.set_shift_latch(true);
		self.set_shift_latch(false);
	}
}
