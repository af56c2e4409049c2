use std::collections::HashMap;
use std::fs;
use std::io::{
	self,
	Write,
};
use std::os::unix::fs::FileExt;
use std::thread;
use std::time::Duration;

use crate::gpio::{
	GpioPort,
	PinDirection,
	PinId,
};

const SYSFS_GPIO: &str = "/sys/class/gpio";

struct SysfsPin {
	direction: fs::File,
	value: fs::File,
	exported_here: bool,
}

pub struct SysfsPort {
	pins: HashMap<PinId, SysfsPin>,
}

fn export(pin: PinId) -> io::Result<bool> {
	let mut f = fs::OpenOptions::new().write(true).open(format!("{}/export", SYSFS_GPIO))?;
	match f.write_all(pin.0.to_string().as_bytes()) {
		Ok(()) => {
			// give udev a moment to apply permissions on the new node
			thread::sleep(Duration::from_millis(10));
			Ok(true)
		}
		// EBUSY: pin was already exported, attribute files exist
		Err(ref e) if e.raw_os_error() == Some(libc::EBUSY) => Ok(false),
		Err(e) => Err(e),
	}
}

fn open_pin(pin: PinId) -> io::Result<SysfsPin> {
	let exported_here = export(pin)?;
	let base = format!("{}/gpio{}", SYSFS_GPIO, pin.0);
	let direction = fs::OpenOptions::new().read(true).write(true).open(format!("{}/direction", base))?;
	let value = fs::OpenOptions::new().read(true).write(true).open(format!("{}/value", base))?;
	Ok(SysfsPin {
		direction,
		value,
		exported_here,
	})
}

pub fn inner_open(pins: &[PinId]) -> io::Result<SysfsPort> {
	let mut port = SysfsPort {
		pins: HashMap::new(),
	};
	for &pin in pins {
		// partial failure: Drop unexports what was exported so far
		let p = open_pin(pin)?;
		port.pins.insert(pin, p);
	}
	Ok(port)
}

impl SysfsPort {
	fn pin(&self, pin: PinId) -> &SysfsPin {
		match self.pins.get(&pin) {
			Some(p) => p,
			None => panic!("{} was not opened with this port", pin),
		}
	}
}

impl GpioPort for SysfsPort {
	fn set_direction(&mut self, pin: PinId, dir: PinDirection) {
		let text: &[u8] = match dir {
			PinDirection::Input => b"in",
			PinDirection::Output => b"out",
		};
		self.pin(pin).direction.write_at(text, 0).expect("sysfs direction write must not fail");
	}

	fn write(&mut self, pin: PinId, level: bool) {
		let text: &[u8] = if level { b"1" } else { b"0" };
		self.pin(pin).value.write_at(text, 0).expect("sysfs value write must not fail");
	}

	fn read(&mut self, pin: PinId) -> bool {
		let mut buf = [0u8];
		self.pin(pin).value.read_at(&mut buf, 0).expect("sysfs value read must not fail");
		buf[0] == b'1'
	}
}

impl Drop for SysfsPort {
	fn drop(&mut self) {
		for (pin, p) in &self.pins {
			if !p.exported_here {
				continue;
			}
			let r = fs::OpenOptions::new()
				.write(true)
				.open(format!("{}/unexport", SYSFS_GPIO))
				.and_then(|mut f| f.write_all(pin.0.to_string().as_bytes()));
			if let Err(e) = r {
				error!("failed to unexport {}: {}", pin, e);
			}
		}
	}
}
