#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate bitbang_i2c_eeprom;
use bitbang_i2c_eeprom::*;

use std::io;
use std::process::exit;

use bitbang_i2c_eeprom::i2c::{
	BusConfig,
	DataRelease,
	DEFAULT_ACK_POLL_LIMIT,
	Hardware,
	HardwareOperations,
};

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

fn get_hex(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	console::parse_hex(param).map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn bus_config(matches: &clap::ArgMatches) -> AResult<BusConfig> {
	let ack_poll_limit = if matches.is_present("ack_polls") {
		get_param(matches, "ack_polls")?
	} else {
		DEFAULT_ACK_POLL_LIMIT
	};
	ensure!(ack_poll_limit > 0, "--ack-polls needs to be at least 1");

	let data_release = if matches.is_present("release") {
		DataRelease::Release
	} else {
		DataRelease::DriveLow
	};

	Ok(BusConfig {
		ack_poll_limit,
		data_release,
	})
}

fn open_hardware(matches: &clap::ArgMatches) -> AResult<Box<dyn Hardware>> {
	let config = bus_config(matches)?;

	if matches.is_present("sim") {
		info!("Using simulated bus (24C16 EEPROM + PCF8574A); contents are lost on exit");
		let mut bus = sim::SimulatedBus::with_devices();
		bus.set_bus_config(config);
		return Ok(Box::new(bus));
	}

	ensure!(matches.is_present("scl") && matches.is_present("sda"), "need --scl and --sda (or --sim)");
	let scl: u32 = get_param(matches, "scl")?;
	let sda: u32 = get_param(matches, "sda")?;
	Ok(Box::new(gpio::open_bus(scl, sda, config)?))
}

fn eeprom_write(bus: &mut dyn Hardware, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = i2c::check_address(get_hex(sub_m, "ADDRESS")?)?;
	let data = i2c::check_data(get_hex(sub_m, "DATA")?)?;

	bus.eeprom_write(address, data)?;
	info!("Wrote {:02x} @{:03x}", data, address);

	Ok(())
}

fn eeprom_read(bus: &mut dyn Hardware, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = i2c::check_address(get_hex(sub_m, "ADDRESS")?)?;

	println!("@{:03x}: {:02x}", address, bus.eeprom_read(address)?);

	Ok(())
}

fn eeprom_dump(bus: &mut dyn Hardware, sub_m: &clap::ArgMatches) -> AResult<()> {
	let start = i2c::check_address(get_hex(sub_m, "START")?)?;
	let end = i2c::check_address(get_hex(sub_m, "END")?)?;

	let data = bus.eeprom_dump(start, end)?;
	print!("{}", console::format_dump(start, &data));

	Ok(())
}

fn expander_write(bus: &mut dyn Hardware, sub_m: &clap::ArgMatches) -> AResult<()> {
	let data = i2c::check_data(get_hex(sub_m, "DATA")?)?;
	bus.write_io_expander(data)
}

fn run_console(bus: &mut dyn Hardware) -> AResult<()> {
	let stdin = io::stdin();
	let mut console = console::Console::new(bus, stdin.lock(), io::stdout());
	console.run()
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg sim: --sim "use a simulated bus with 24C16 EEPROM and PCF8574A")
		(@arg scl: --scl +takes_value "sysfs GPIO number for CLK")
		(@arg sda: --sda +takes_value "sysfs GPIO number for DATA")
		(@arg ack_polls: --("ack-polls") +takes_value "how often to sample DATA waiting for an acknowledge")
		(@arg release: --release "release DATA after sending a byte instead of driving it low")
		(@subcommand write =>
			(about: "write a byte to the EEPROM")
			(@arg ADDRESS: +required "EEPROM address (hex, 000-7ff)")
			(@arg DATA: +required "data byte (hex, 00-ff)")
		)
		(@subcommand read =>
			(about: "read a byte from the EEPROM")
			(@arg ADDRESS: +required "EEPROM address (hex, 000-7ff)")
		)
		(@subcommand dump =>
			(about: "hex dump of an EEPROM address range")
			(@arg START: +required "first address (hex, 000-7ff)")
			(@arg END: +required "last address (hex, 000-7ff)")
		)
		(@subcommand reset =>
			(about: "clock a stuck device off the bus")
		)
		(@subcommand expander_write =>
			(about: "write the IO expander port")
			(@arg DATA: +required "port value (hex, 00-ff)")
		)
		(@subcommand expander_read =>
			(about: "read the IO expander port")
		)
		(@subcommand expander_toggle =>
			(about: "set IO expander P1 to the inverse of P0")
		)
		(@subcommand console =>
			(about: "interactive command menu on stdin/stdout")
		)
	).get_matches();

	let mut hardware = open_hardware(&matches)?;
	let bus: &mut dyn Hardware = &mut *hardware;

	match matches.subcommand() {
		("write", Some(sub_m)) => {
			eeprom_write(bus, sub_m)
		},
		("read", Some(sub_m)) => {
			eeprom_read(bus, sub_m)
		},
		("dump", Some(sub_m)) => {
			eeprom_dump(bus, sub_m)
		},
		("reset", _) => {
			bus.reset_bus();
			Ok(())
		},
		("expander_write", Some(sub_m)) => {
			expander_write(bus, sub_m)
		},
		("expander_read", _) => {
			println!("{:02x}", bus.read_io_expander()?);
			Ok(())
		},
		("expander_toggle", _) => {
			println!("{:02x}", bus.io_expander_toggle()?);
			Ok(())
		},
		("console", _) => {
			run_console(bus)
		},
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
