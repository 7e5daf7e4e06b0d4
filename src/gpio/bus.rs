use std::io;

use crate::i2c::{
	BusConfig,
	Hardware,
	Line,
};

use super::GpioPin;

pub struct SysfsBus {
	clock: GpioPin,
	data: GpioPin,
	config: BusConfig,
}

impl SysfsBus {
	fn pin(&mut self, line: Line) -> &mut GpioPin {
		match line {
			Line::Clock => &mut self.clock,
			Line::Data => &mut self.data,
		}
	}
}

impl Hardware for SysfsBus {
	fn set_line(&mut self, line: Line, level: bool) {
		let pin = self.pin(line);
		if let Err(e) = pin.set_level(level) {
			panic!("GPIO {}: failed to set level: {}", pin.number(), e);
		}
	}

	fn read_line(&mut self, line: Line) -> bool {
		let pin = self.pin(line);
		match pin.level() {
			Ok(level) => level,
			Err(e) => panic!("GPIO {}: failed to read level: {}", pin.number(), e),
		}
	}

	fn bus_config(&self) -> BusConfig {
		self.config
	}
}

// only one process may drive the bus; the lock goes away with the file
fn lock_exclusive(pin: &GpioPin) -> crate::AResult<()> {
	let r = unsafe { libc::flock(pin.value_fd(), libc::LOCK_EX | libc::LOCK_NB) };
	if r != 0 {
		let e = io::Error::last_os_error();
		if e.kind() == io::ErrorKind::WouldBlock {
			bail!("GPIO {} is in use by another process", pin.number());
		}
		bail!("couldn't lock GPIO {}: {}", pin.number(), e);
	}
	Ok(())
}

pub fn open_bus(clock: u32, data: u32, config: BusConfig) -> crate::AResult<SysfsBus> {
	ensure!(clock != data, "CLK and DATA need different GPIOs (both are {})", clock);

	let data = GpioPin::open(data)?;
	lock_exclusive(&data)?;
	let clock = GpioPin::open(clock)?;

	info!("I2C bus on GPIO {} (CLK) / GPIO {} (DATA)", clock.number(), data.number());

	let mut bus = SysfsBus {
		clock,
		data,
		config,
	};
	if !bus.read_line(Line::Data) {
		warn!("DATA is held low by a device; a bus reset may help");
	}
	Ok(bus)
}
