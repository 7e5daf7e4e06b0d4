//! Interactive command menu on top of the transaction engine.
//!
//! Commands are single letters (case-insensitive), numbers are entered in
//! hex, one per line.

use std::fmt::Write as FmtWrite;
use std::io::{
	self,
	BufRead,
	Write,
};

use crate::i2c::{
	check_address,
	check_data,
	Hardware,
	HardwareOperations,
};

const MENU: &str = "
 ------------------------------
 ---- EEPROM I2C Interface ----
 ------------------------------
 COMMANDS:
 W - Write Data to EEPROM
 R - Read Data from EEPROM
 D - Hex Dump of EEPROM
 S - Reset I2C Bus
 I - Toggle IO Expander P1 from P0
 Q - Quit
 ------------------------------";

const DUMP_BYTES_PER_LINE: usize = 16;

/// Parse a hex number; whitespace and a `0x` prefix are ignored, empty
/// input is 0.
pub fn parse_hex(input: &str) -> crate::AResult<u32> {
	let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
	let digits = if digits.starts_with("0x") || digits.starts_with("0X") {
		&digits[2..]
	} else {
		&digits[..]
	};

	let mut value: u32 = 0;
	for c in digits.chars() {
		let digit = match c.to_digit(16) {
			Some(d) => d,
			None => bail!("Invalid hex digit {:?}", c),
		};
		value = match value.checked_mul(16).and_then(|v| v.checked_add(digit)) {
			Some(v) => v,
			None => bail!("Number too large: {:?}", input.trim()),
		};
	}
	Ok(value)
}

/// 16 bytes per line, each line prefixed with the address of its first byte.
pub fn format_dump(start: u16, data: &[u8]) -> String {
	let mut out = String::new();
	for (i, chunk) in data.chunks(DUMP_BYTES_PER_LINE).enumerate() {
		let address = start as usize + i * DUMP_BYTES_PER_LINE;
		let _ = write!(out, "{:03X}:", address);
		for b in chunk {
			let _ = write!(out, " {:02X}", b);
		}
		out.push('\n');
	}
	out
}

pub struct Console<H: Hardware, R: BufRead, W: Write> {
	bus: H,
	input: R,
	output: W,
}

impl<H: Hardware, R: BufRead, W: Write> Console<H, R, W> {
	pub fn new(bus: H, input: R, output: W) -> Self {
		Console {
			bus,
			input,
			output,
		}
	}

	pub fn bus(&self) -> &H {
		&self.bus
	}

	pub fn output(&self) -> &W {
		&self.output
	}

	/// Runs until `Q` or end of input.
	pub fn run(&mut self) -> crate::AResult<()> {
		writeln!(self.output, "{}", MENU)?;
		loop {
			writeln!(self.output, "\n ENTER THE COMMAND: ")?;
			self.output.flush()?;

			let line = match self.read_line()? {
				None => return Ok(()),
				Some(line) => line,
			};
			let command = match line.trim().chars().next() {
				None => continue,
				Some(c) => c.to_ascii_uppercase(),
			};
			if command == 'Q' {
				return Ok(());
			}

			if let Err(e) = self.command(command) {
				// losing the terminal ends the console, everything else is
				// reported and the next command can be entered
				if e.downcast_ref::<io::Error>().is_some() {
					return Err(e);
				}
				writeln!(self.output, "\n{}", e)?;
			}
		}
	}

	fn command(&mut self, command: char) -> crate::AResult<()> {
		match command {
			'W' => self.eeprom_write(),
			'R' => self.eeprom_read(),
			'D' => self.eeprom_dump(),
			'S' => {
				self.bus.reset_bus();
				writeln!(self.output, "\n DONE I2C Bus Reset")?;
				writeln!(self.output, "{}", MENU)?;
				Ok(())
			},
			'I' => {
				let data = self.bus.io_expander_toggle()?;
				writeln!(self.output, "\nIO expander port = {:02X}", data)?;
				Ok(())
			},
			_ => {
				writeln!(self.output, "\n Please give the valid command!")?;
				writeln!(self.output, "{}", MENU)?;
				Ok(())
			},
		}
	}

	fn read_line(&mut self) -> crate::AResult<Option<String>> {
		let mut line = String::new();
		if 0 == self.input.read_line(&mut line)? {
			return Ok(None);
		}
		Ok(Some(line))
	}

	fn prompt_hex(&mut self, prompt: &str) -> crate::AResult<u32> {
		writeln!(self.output, "\n{}", prompt)?;
		self.output.flush()?;
		match self.read_line()? {
			None => bail!("Unexpected end of input"),
			Some(line) => parse_hex(&line),
		}
	}

	fn eeprom_write(&mut self) -> crate::AResult<()> {
		writeln!(self.output, "\nWriting to EEPROM")?;
		let data = check_data(self.prompt_hex("Enter Data to put into EEPROM")?)?;
		let address = check_address(self.prompt_hex("Enter Address to put into EEPROM")?)?;

		self.bus.eeprom_write(address, data)?;
		writeln!(self.output, "\nFinished writing to EEPROM")?;
		Ok(())
	}

	fn eeprom_read(&mut self) -> crate::AResult<()> {
		writeln!(self.output, "\nReading from EEPROM")?;
		let address = check_address(self.prompt_hex("Enter Address to read from EEPROM")?)?;

		let data = self.bus.eeprom_read(address)?;
		writeln!(self.output, "\nData = {:02X} present at Location = {:03X}", data, address)?;
		Ok(())
	}

	fn eeprom_dump(&mut self) -> crate::AResult<()> {
		let start = check_address(self.prompt_hex("Enter Start Address for HEX Dump")?)?;
		let end = check_address(self.prompt_hex("Enter End Address for HEX Dump")?)?;

		let data = self.bus.eeprom_dump(start, end)?;
		writeln!(self.output, "\nI2C EEPROM DUMP")?;
		write!(self.output, "{}", format_dump(start, &data))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim::SimulatedBus;

	use std::io::Cursor;

	fn run(bus: SimulatedBus, input: &str) -> (SimulatedBus, String) {
		let mut console = Console::new(bus, Cursor::new(input.as_bytes().to_vec()), Vec::new());
		console.run().unwrap();
		let output = String::from_utf8(console.output().clone()).unwrap();
		let Console { bus, .. } = console;
		(bus, output)
	}

	#[test]
	fn parse_hex_input() {
		assert_eq!(parse_hex("7ff\n").unwrap(), 0x7ff);
		assert_eq!(parse_hex(" aB \r\n").unwrap(), 0xab);
		assert_eq!(parse_hex("0x100").unwrap(), 0x100);
		assert_eq!(parse_hex("\n").unwrap(), 0);
		assert!(parse_hex("12g").is_err());
		assert!(parse_hex("123456789").is_err());
	}

	#[test]
	fn dump_format() {
		let data: Vec<u8> = (0..18).collect();
		assert_eq!(format_dump(0x7e0, &data),
			"7E0: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\n7F0: 10 11\n");
		assert_eq!(format_dump(0, &[]), "");
	}

	#[test]
	fn write_then_read() {
		let (bus, output) = run(SimulatedBus::with_devices(), "w\n42\n100\nR\n100\nq\n");
		assert_eq!(bus.eeprom().unwrap().memory()[0x100], 0x42);
		assert!(output.contains("Finished writing to EEPROM"));
		assert!(output.contains("Data = 42 present at Location = 100"));
	}

	#[test]
	fn invalid_data_does_not_touch_bus() {
		let (bus, output) = run(SimulatedBus::with_devices(), "W\n100\n");
		assert!(output.contains("Invalid Data Range"));
		assert_eq!(bus.transitions(), 0);

		let (bus, output) = run(SimulatedBus::with_devices(), "w\n12\n800\nr\nfff\n");
		assert!(output.contains("Invalid Address Range"));
		assert!(!output.contains("Data ="));
		assert_eq!(bus.transitions(), 0);
	}

	#[test]
	fn dump_command() {
		let mut bus = SimulatedBus::with_devices();
		bus.eeprom_mut().unwrap().memory_mut()[0x010] = 0xa5;
		let (_, output) = run(bus, "d\n10\n11\n");
		assert!(output.contains("I2C EEPROM DUMP\n010: A5 FF\n"));
	}

	#[test]
	fn reset_and_unknown_commands() {
		let (bus, output) = run(SimulatedBus::with_devices(), "s\nx\n\n");
		assert!(output.contains("DONE I2C Bus Reset"));
		assert!(output.contains("Please give the valid command!"));
		assert!(bus.transitions() > 0);
	}

	#[test]
	fn missing_device_reported() {
		let mut bus = SimulatedBus::new();
		bus.set_bus_config(crate::i2c::BusConfig {
			ack_poll_limit: 2,
			data_release: crate::i2c::DataRelease::Release,
		});
		let (_, output) = run(bus, "i\nr\n0\n");
		assert_eq!(output.matches("no acknowledge from device").count(), 2);
	}
}
