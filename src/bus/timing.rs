use std::thread;
use std::time::{
	Duration,
	Instant,
};

/// Hold times the sequencer inserts for the device's benefit. Which values
/// are load-bearing depends on the part on the bus: the defaults satisfy
/// slow EPROM-class devices, SRAM tolerates zero holds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Timing {
	/// write strobe held asserted this long per byte
	pub write_pulse: Duration,
	/// how long a parked address stays presented on the bus
	pub park_hold: Duration,
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			write_pulse: Duration::from_millis(1),
			park_hold: Duration::from_millis(50),
		}
	}
}

impl Timing {
	/// No holds at all; for simulated hardware and tests.
	pub fn immediate() -> Self {
		Timing {
			write_pulse: Duration::from_secs(0),
			park_hold: Duration::from_secs(0),
		}
	}
}

/// Sleep for at least `duration`, resuming after interruptions.
pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

pub(super) fn hold(duration: Duration) {
	if duration > Duration::from_secs(0) {
		reliable_sleep(duration);
	}
}
