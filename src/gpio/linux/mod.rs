use std::io;

mod sysfs;

use crate::gpio::{
	GpioPort,
	PinId,
};

/// Opens the given pins through the sysfs GPIO interface
/// (`/sys/class/gpio`). Pins not yet exported are exported here and
/// unexported again when the port is dropped.
pub fn open_sysfs_port(pins: &[PinId]) -> io::Result<impl GpioPort> {
	sysfs::inner_open(pins)
}
