#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate busprog;
use busprog::*;

use std::fs::File;
use std::io::{
	self,
	Write,
};
use std::process::exit;

const DEFAULT_BAUD: u32 = 115200;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

// byte and register values accept decimal or 0x-prefixed hex
fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let value = if param.starts_with("0x") || param.starts_with("0X") {
		u32::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<u32>()
	};
	match value {
		Ok(v) => Ok(v),
		Err(e) => bail!("invalid parameter {}: {}", name, e),
	}
}

fn open_device(sub_m: &clap::ArgMatches) -> AResult<protocol::Remote<File>> {
	let path = match sub_m.value_of("DEVICE") {
		Some(p) => p,
		None => bail!("missing parameter DEVICE"),
	};
	let baud = if sub_m.is_present("baud") {
		get_param(sub_m, "baud")?
	} else {
		DEFAULT_BAUD
	};

	Ok(protocol::Remote::new(tty::open_serial(path, baud)?))
}

fn read(sub_m: &clap::ArgMatches) -> AResult<()> {
	let addr: bus::Address = get_param(sub_m, "ADDRESS")?;

	let mut remote = open_device(sub_m)?;
	let value = remote.read(addr)?;
	println!("{}: 0x{:02x}", addr, value);

	Ok(())
}

fn write(sub_m: &clap::ArgMatches) -> AResult<()> {
	let addr: bus::Address = get_param(sub_m, "ADDRESS")?;
	let value = get_number(sub_m, "VALUE")?;
	ensure!(value <= 0xff, "byte value 0x{:x} out of range", value);
	let value = value as u8;

	let mut remote = open_device(sub_m)?;
	remote.write_byte(addr, value)?;
	if sub_m.is_present("verify") {
		let got = remote.read(addr)?;
		ensure!(
			got == value,
			"verify mismatch at {}: wrote 0x{:02x}, read back 0x{:02x}",
			addr,
			value,
			got
		);
	}
	println!("{} <- 0x{:02x}", addr, value);

	Ok(())
}

fn park(sub_m: &clap::ArgMatches) -> AResult<()> {
	let addr: bus::Address = get_param(sub_m, "ADDRESS")?;

	let mut remote = open_device(sub_m)?;
	remote.park(addr)?;
	println!("parked at {}", addr);

	Ok(())
}

fn set_shifter(sub_m: &clap::ArgMatches) -> AResult<()> {
	let value = get_number(sub_m, "VALUE")?;
	ensure!(value <= 0xffff, "extender value 0x{:x} out of range", value);

	let mut remote = open_device(sub_m)?;
	remote.set_extended(value as u16)?;
	println!("extender register now 0x{:04x}", value);

	Ok(())
}

fn dump(sub_m: &clap::ArgMatches) -> AResult<()> {
	let addr: bus::Address = get_param(sub_m, "ADDRESS")?;
	let length = get_number(sub_m, "LENGTH")?;

	let mut remote = open_device(sub_m)?;

	let stdout = io::stdout();
	let mut out = stdout.lock();
	remote.dump(addr, length, &mut out)?;
	out.flush()?;

	Ok(())
}

fn upload(sub_m: &clap::ArgMatches) -> AResult<()> {
	use failure::ResultExt;

	let addr: bus::Address = get_param(sub_m, "ADDRESS")?;
	ensure!(0 == addr.low, "upload start {} is not page aligned", addr);
	let file = match sub_m.value_of("FILE") {
		Some(p) => p,
		None => bail!("missing parameter FILE"),
	};

	let data = std::fs::read(file).context(format!("reading {:?}", file))?;
	ensure!(!data.is_empty(), "image file {:?} is empty", file);

	let mut remote = open_device(sub_m)?;
	remote.upload(addr.page, &data)?;
	if sub_m.is_present("verify") {
		remote.verify(addr.page, &data)?;
	}
	println!("uploaded {} bytes at {}", data.len(), addr);

	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@subcommand read =>
			(about: "read one byte")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg ADDRESS: +required "memory location (linear or bank:offset)")
		)
		(@subcommand write =>
			(about: "write one byte")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg verify: -V --verify "read the byte back afterwards")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg ADDRESS: +required "memory location (linear or bank:offset)")
			(@arg VALUE: +required "byte value to write")
		)
		(@subcommand park =>
			(about: "hold an address on the bus for probing")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg ADDRESS: +required "memory location (linear or bank:offset)")
		)
		(@subcommand set_shifter =>
			(about: "load a raw value into the address extender register")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg VALUE: +required "16 bit register value")
		)
		(@subcommand dump =>
			(about: "dump a memory range as binary to stdout")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg ADDRESS: +required "memory location (linear or bank:offset)")
			(@arg LENGTH: +required "number of bytes to read")
		)
		(@subcommand upload =>
			(about: "write an image file starting at a page boundary")
			(@arg baud: -b --baud +takes_value "serial baud rate (default 115200)")
			(@arg verify: -V --verify "read the image back afterwards")
			(@arg DEVICE: +required "serial device of the programmer")
			(@arg ADDRESS: +required "page aligned start (linear or bank:offset)")
			(@arg FILE: +required "image file to write")
		)
	).get_matches();

	match matches.subcommand() {
		("read", Some(sub_m)) => {
			read(sub_m)
		}
		("write", Some(sub_m)) => {
			write(sub_m)
		}
		("park", Some(sub_m)) => {
			park(sub_m)
		}
		("set_shifter", Some(sub_m)) => {
			set_shifter(sub_m)
		}
		("dump", Some(sub_m)) => {
			dump(sub_m)
		}
		("upload", Some(sub_m)) => {
			upload(sub_m)
		}
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
