#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate busprog;
use busprog::*;

use std::io;
use std::process::exit;
use std::time::Duration;

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

fn run<P: gpio::GpioPort>(port: P, map: bus::PinMap, timing: bus::Timing) -> AResult<()> {
	let stdin = io::stdin();
	let stdout = io::stdout();
	let mut seq = bus::Sequencer::new(port, map, timing);
	seq.init();
	protocol::serve(&mut seq, stdin.lock(), stdout.lock())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@arg sim: --sim "drive a simulated bus instead of the GPIO port")
		(@arg remap: --remap +takes_value "override bus line assignments (name=gpio, comma separated)")
		(@arg write_pulse: --("write-pulse-us") +takes_value "write strobe hold in microseconds (default 1000)")
		(@arg park_hold: --("park-hold-ms") +takes_value "park hold in milliseconds (default 50)")
	).get_matches();

	let mut map = bus::PinMap::default();
	if let Some(spec) = matches.value_of("remap") {
		map.apply(spec)?;
	}

	let mut timing = bus::Timing::default();
	if matches.is_present("write_pulse") {
		timing.write_pulse = Duration::from_micros(get_param(&matches, "write_pulse")?);
	}
	if matches.is_present("park_hold") {
		timing.park_hold = Duration::from_millis(get_param(&matches, "park_hold")?);
	}

	if matches.is_present("sim") {
		info!("serving commands on stdio against a simulated bus");
		run(sim::SimBus::new(map.clone()), map, timing)
	} else {
		info!("serving commands on stdio over the sysfs GPIO port");
		let port = gpio::open_sysfs_port(&map.pins())?;
		run(port, map, timing)
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
