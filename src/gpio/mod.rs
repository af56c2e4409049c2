use std::fmt;
use std::str;

mod linux;

pub use self::linux::open_sysfs_port;

/// Identifies a pin by the controller's own numbering (BCM/global GPIO
/// number, not a header position).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PinId(pub u16);

impl fmt::Display for PinId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "GPIO{}", self.0)
	}
}

impl str::FromStr for PinId {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		with_context!(("invalid GPIO number: {:?}", s), {
			Ok(PinId(s.parse::<u16>()?))
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum PinDirection {
	Input,
	Output,
}

/// Per-pin hardware access. Operations are infallible: once a port is open,
/// a failing pin access means the hardware is gone and there is no useful
/// recovery above this layer.
pub trait GpioPort {
	fn set_direction(&mut self, pin: PinId, dir: PinDirection);
	fn write(&mut self, pin: PinId, level: bool);
	fn read(&mut self, pin: PinId) -> bool;
}

impl<'a, P: ?Sized + GpioPort> GpioPort for &'a mut P {
	fn set_direction(&mut self, pin: PinId, dir: PinDirection) {
		P::set_direction(*self, pin, dir)
	}

	fn write(&mut self, pin: PinId, level: bool) {
		P::write(*self, pin, level)
	}

	fn read(&mut self, pin: PinId) -> bool {
		P::read(*self, pin)
	}
}
