use std::fs;
use std::io::{
	self,
	Write,
};
use std::os::unix::fs::FileExt;
use std::os::unix::io::{
	AsRawFd,
	RawFd,
};
use std::path::Path;
use std::time::Duration;

use crate::i2c::reliable_sleep;

const SYSFS_GPIO: &str = "/sys/class/gpio";

// udev needs a moment to fix permissions of freshly exported pins
const EXPORT_RETRIES: usize = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(5);

fn pin_file(number: u32, name: &str) -> String {
	format!("{}/gpio{}/{}", SYSFS_GPIO, number, name)
}

fn write_control(name: &str, number: u32) -> crate::AResult<()> {
	with_context!(("couldn't write {} to {}/{}", number, SYSFS_GPIO, name), {
		fs::OpenOptions::new()
			.write(true)
			.open(format!("{}/{}", SYSFS_GPIO, name))?
			.write_all(number.to_string().as_bytes())?;
		Ok(())
	})
}

fn open_pin_file(number: u32, name: &str, writable: bool) -> crate::AResult<fs::File> {
	let path = pin_file(number, name);
	let mut retries = EXPORT_RETRIES;
	loop {
		match fs::OpenOptions::new().read(true).write(writable).open(&path) {
			Ok(file) => return Ok(file),
			Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied && retries > 0 => {
				retries -= 1;
				reliable_sleep(EXPORT_RETRY_DELAY);
			},
			Err(e) => {
				let e = failure::Error::from(e);
				let msg = format!("couldn't open {}", path);
				return Err(e.context(msg).into());
			},
		}
	}
}

/// GPIO used as open-drain line: "high" releases the pin (input, the bus
/// pull-up does the rest), "low" drives it low.
pub struct GpioPin {
	number: u32,
	direction: fs::File,
	value: fs::File,
	// unexport on drop
	exported: bool,
}

impl GpioPin {
	pub fn open(number: u32) -> crate::AResult<Self> {
		let exported = if !Path::new(&pin_file(number, "value")).exists() {
			debug!("exporting GPIO {}", number);
			write_control("export", number)?;
			true
		} else {
			false
		};

		let direction = open_pin_file(number, "direction", true)?;
		let value = open_pin_file(number, "value", false)?;

		let mut pin = GpioPin {
			number,
			direction,
			value,
			exported,
		};
		with_context!(("couldn't release GPIO {}", number), {
			pin.set_level(true)?;
			Ok(())
		})?;
		Ok(pin)
	}

	pub fn number(&self) -> u32 {
		self.number
	}

	pub fn set_level(&mut self, level: bool) -> io::Result<()> {
		// "low" switches to output and drives low in one step
		let direction: &[u8] = if level { b"in" } else { b"low" };
		self.direction.write_all_at(direction, 0)
	}

	pub fn level(&self) -> io::Result<bool> {
		let mut buf = [0u8];
		let l = self.value.read_at(&mut buf, 0)?;
		if l != 1 {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty GPIO value"));
		}
		match buf[0] {
			b'0' => Ok(false),
			b'1' => Ok(true),
			c => Err(io::Error::new(io::ErrorKind::InvalidData, format!("invalid GPIO value {:?}", c as char))),
		}
	}

	pub(super) fn value_fd(&self) -> RawFd {
		self.value.as_raw_fd()
	}
}

impl Drop for GpioPin {
	fn drop(&mut self) {
		if self.exported {
			if let Err(e) = write_control("unexport", self.number) {
				warn!("{}", e);
			}
		}
	}
}
