//! Drive for a parallel EPROM/SRAM-class memory device behind a 24-bit
//! multiplexed address path.
//!
//! Wiring:
//! - 8 address lines (A0..A7), driven directly; the low byte of an address.
//! - 8 data lines (D0..D7), bidirectional.
//! - two strobes: RE (device drives the data lines while asserted) and
//!   WE (device commits the data lines on the pulse).
//! - a serial-in/parallel-out shift register (74xx595-style: data, clock,
//!   latch, active-low output enable) holding the upper 16 address bits,
//!   i.e. `(bank << 8) | addr_high`.
//!
//! The data lines are shared with other bus masters, so everything here
//! ends in a released state: both buses as inputs, strobes deasserted,
//! register outputs disabled. Only a transaction drives the bus, and only
//! for its own duration.

mod lines;
mod port;
mod shifter;
mod timing;
mod transactions;

pub use self::lines::PinMap;

pub use self::port::Pins;

pub use self::timing::{
	Timing,
	reliable_sleep,
};

pub use self::transactions::{
	Address,
	PAGE_SIZE,
	Page,
	Sequencer,
};
