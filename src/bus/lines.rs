use crate::gpio::PinId;

/// Logical bus line → physical pin assignment. Index 0 of a bus array is
/// the least significant bit of the byte on that bus.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PinMap {
	pub address: [PinId; 8],
	pub data: [PinId; 8],
	pub read_strobe: PinId,
	pub write_strobe: PinId,
	pub shift_data: PinId,
	pub shift_clock: PinId,
	pub shift_latch: PinId,
	pub shift_output_enable_n: PinId,
}

impl Default for PinMap {
	/// The board this was first wired for: a Pico with the address bus on
	/// GPIO 6-13 and the data bus split across GPIO 18-21 and 26-29.
	fn default() -> Self {
		PinMap {
			address: [
				PinId(6), PinId(7), PinId(8), PinId(9),
				PinId(10), PinId(11), PinId(12), PinId(13),
			],
			data: [
				PinId(18), PinId(19), PinId(20), PinId(21),
				PinId(26), PinId(27), PinId(28), PinId(29),
			],
			read_strobe: PinId(17),
			write_strobe: PinId(16),
			shift_data: PinId(14),
			shift_clock: PinId(15),
			shift_latch: PinId(3),
			shift_output_enable_n: PinId(2),
		}
	}
}

impl PinMap {
	/// Every assigned pin, in a stable order. Used to open the backing
	/// port and to check the assignment for collisions.
	pub fn pins(&self) -> Vec<PinId> {
		let mut list = Vec::with_capacity(22);
		list.extend_from_slice(&self.address);
		list.extend_from_slice(&self.data);
		list.push(self.read_strobe);
		list.push(self.write_strobe);
		list.push(self.shift_data);
		list.push(self.shift_clock);
		list.push(self.shift_latch);
		list.push(self.shift_output_enable_n);
		list
	}

	fn slot(&mut self, name: &str) -> Option<&mut PinId> {
		let line = match name {
			"re" => &mut self.read_strobe,
			"we" => &mut self.write_strobe,
			"sr_data" => &mut self.shift_data,
			"sr_clock" => &mut self.shift_clock,
			"sr_latch" => &mut self.shift_latch,
			"sr_oe" => &mut self.shift_output_enable_n,
			_ => {
				if name.len() != 2 || !name.is_ascii() {
					return None;
				}
				let (bus, bit) = name.split_at(1);
				let bit = bit.parse::<usize>().ok().filter(|&b| b < 8)?;
				match bus {
					"a" => &mut self.address[bit],
					"d" => &mut self.data[bit],
					_ => return None,
				}
			}
		};
		Some(line)
	}

	/// Applies a remap string: comma-separated `name=gpio` entries, where
	/// `name` is one of `a0`..`a7`, `d0`..`d7`, `re`, `we`, `sr_data`,
	/// `sr_clock`, `sr_latch`, `sr_oe`.
	pub fn apply(&mut self, spec: &str) -> crate::AResult<()> {
		for entry in spec.split(',') {
			let entry = entry.trim();
			if entry.is_empty() {
				continue;
			}
			let mut parts = entry.splitn(2, '=');
			let name = parts.next().unwrap_or("");
			let pin_s = match parts.next() {
				Some(p) => p,
				None => bail!("remap entry {:?} has no '='", entry),
			};
			let pin = pin_s.parse::<PinId>()?;
			match self.slot(name) {
				Some(line) => *line = pin,
				None => bail!("unknown bus line {:?} in remap entry {:?}", name, entry),
			}
		}
		self.ensure_distinct()
	}

	pub fn ensure_distinct(&self) -> crate::AResult<()> {
		let pins = self.pins();
		for (i, a) in pins.iter().enumerate() {
			for b in &pins[i + 1..] {
				ensure!(a != b, "{} is assigned to more than one bus line", a);
			}
		}
		Ok(())
	}
}
