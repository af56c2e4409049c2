//! Serial device setup for the host side of the link.

use std::fs::{
	File,
	OpenOptions,
};
use std::io;
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use libc::{
	B115200,
	B19200,
	B230400,
	B38400,
	B57600,
	B9600,
	CLOCAL,
	CREAD,
	O_NOCTTY,
	TCSANOW,
	VMIN,
	VTIME,
	cfmakeraw,
	cfsetispeed,
	cfsetospeed,
	isatty,
	speed_t,
	tcgetattr,
	tcsetattr,
	termios,
};

fn baud_constant(baud: u32) -> Option<speed_t> {
	Some(match baud {
		9600 => B9600,
		19200 => B19200,
		38400 => B38400,
		57600 => B57600,
		115200 => B115200,
		230400 => B230400,
		_ => return None,
	})
}

/// Opens the programmer's serial device raw: no line editing, no echo, no
/// flow control, modem lines ignored, reads blocking for at least one
/// byte. The protocol mixes raw binary argument bytes with text, so any
/// line discipline on the way corrupts commands.
pub fn open_serial(path: &str, baud: u32) -> crate::AResult<File> {
	let speed = match baud_constant(baud) {
		Some(speed) => speed,
		None => bail!("unsupported baud rate {}", baud),
	};

	let file = with_context!(("open {:?}", path), {
		Ok(OpenOptions::new()
			.read(true)
			.write(true)
			.custom_flags(O_NOCTTY)
			.open(path)?)
	})?;

	// FIFOs and plain files carry the bytes as-is; only a real terminal
	// needs its line discipline taken out of the way
	let fd = file.as_raw_fd();
	if 0 == unsafe { isatty(fd) } {
		debug!("{:?} is not a tty, leaving it unconfigured", path);
		return Ok(file);
	}

	let mut tio: termios = unsafe { mem::zeroed() };
	if 0 != unsafe { tcgetattr(fd, &mut tio) } {
		return Err(io::Error::last_os_error().into());
	}
	unsafe { cfmakeraw(&mut tio) };
	tio.c_cflag |= CLOCAL | CREAD;
	tio.c_cc[VMIN] = 1;
	tio.c_cc[VTIME] = 0;
	if 0 != unsafe { cfsetispeed(&mut tio, speed) } {
		return Err(io::Error::last_os_error().into());
	}
	if 0 != unsafe { cfsetospeed(&mut tio, speed) } {
		return Err(io::Error::last_os_error().into());
	}
	if 0 != unsafe { tcsetattr(fd, TCSANOW, &tio) } {
		return Err(io::Error::last_os_error().into());
	}

	debug!("{:?} configured raw at {} baud", path, baud);
	Ok(file)
}
