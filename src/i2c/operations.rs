use super::{
	BusError,
	Hardware,
	LowLevel,
};

// PCF8574A: 7-bit address 0b0111_000 plus direction bit
pub const IO_EXPANDER_WRITE_ADDRESS: u8 = 0x70;
pub const IO_EXPANDER_READ_ADDRESS: u8 = 0x71;

// 24C16: 0b1010 identifier, three block select bits, direction bit
const EEPROM_IDENTIFIER: u8 = 0xa0;
const WRITE_MASK: u8 = 0xfe;
const READ_BIT: u8 = 0x01;

pub const EEPROM_ADDRESS_MAX: u16 = 0x7ff;
pub const DATA_MAX: u32 = 0xff;

pub fn check_address(address: u32) -> crate::AResult<u16> {
	if address > EEPROM_ADDRESS_MAX as u32 {
		return Err(BusError::AddressOutOfRange { address }.into());
	}
	Ok(address as u16)
}

pub fn check_data(data: u32) -> crate::AResult<u8> {
	if data > DATA_MAX {
		return Err(BusError::DataOutOfRange { data }.into());
	}
	Ok(data as u8)
}

/// Split a memory address into the device address byte (write direction)
/// with the block select bits, and the word address byte.
pub fn eeprom_address(address: u16) -> crate::AResult<(u8, u8)> {
	let address = check_address(address as u32)?;
	let word = address as u8;
	let device = ((address >> 7) as u8 | EEPROM_IDENTIFIER) & WRITE_MASK;
	Ok((device, word))
}

/// START has been sent; owns the bus until dropped, which sends STOP.
///
/// STOP is also sent when an operation bails out on a missing acknowledge,
/// so the devices are back to idle for the next transaction.
pub struct Transaction<'a, H: ?Sized + Hardware + 'a>(&'a mut H);

impl<'a, H: ?Sized + Hardware> Transaction<'a, H> {
	pub fn start(hardware: &'a mut H) -> Self {
		hardware.start();
		Transaction(hardware)
	}

	pub fn repeated_start(&mut self) {
		self.0.start();
	}

	// send byte and require an acknowledge
	pub fn send(&mut self, byte: u8) -> crate::AResult<()> {
		self.0.write_byte(byte);
		self.0.wait_ack()
	}

	// receive byte and acknowledge it
	pub fn receive(&mut self) -> u8 {
		let byte = self.0.read_byte();
		self.0.send_ack();
		byte
	}

	// receive byte and end the read phase
	pub fn receive_last(&mut self) -> u8 {
		let byte = self.0.read_byte();
		self.0.send_nack();
		byte
	}
}

impl<'a, H: ?Sized + Hardware> Drop for Transaction<'a, H> {
	fn drop(&mut self) {
		self.0.stop();
	}
}

pub trait HardwareOperations: Hardware {
	fn write_io_expander(&mut self, data: u8) -> crate::AResult<()> {
		debug!("IO expander write 0x{:02x}", data);
		let mut tx = Transaction::start(self);
		tx.send(IO_EXPANDER_WRITE_ADDRESS)?;
		tx.send(data)
	}

	fn read_io_expander(&mut self) -> crate::AResult<u8> {
		let mut tx = Transaction::start(self);
		tx.send(IO_EXPANDER_READ_ADDRESS)?;
		let data = tx.receive();
		debug!("IO expander read 0x{:02x}", data);
		Ok(data)
	}

	/// Set all port pins as inputs, then drive P1 to the inverse of P0.
	///
	/// Returns the value written to the port.
	fn io_expander_toggle(&mut self) -> crate::AResult<u8> {
		self.write_io_expander(0xff)?;
		let mut data = self.read_io_expander()?;
		if 0 != data & 0x01 {
			data &= !0x02;
		} else {
			data |= 0x02;
		}
		self.write_io_expander(data)?;
		Ok(data)
	}

	fn eeprom_write(&mut self, address: u16, data: u8) -> crate::AResult<()> {
		let (device, word) = eeprom_address(address)?;
		debug!("EEPROM write @{:03x}: {:02x}", address, data);

		let mut tx = Transaction::start(self);
		tx.send(device)?;
		tx.send(word)?;
		tx.send(data)
	}

	fn eeprom_read(&mut self, address: u16) -> crate::AResult<u8> {
		let (device, word) = eeprom_address(address)?;

		let mut tx = Transaction::start(self);
		// dummy write to load the address pointer
		tx.send(device)?;
		tx.send(word)?;
		tx.repeated_start();
		tx.send(device | READ_BIT)?;
		let data = tx.receive_last();

		debug!("EEPROM read @{:03x}: {:02x}", address, data);
		Ok(data)
	}

	/// Read `start..=end`, one random read per address.
	fn eeprom_dump(&mut self, start: u16, end: u16) -> crate::AResult<Vec<u8>> {
		check_address(start as u32)?;
		check_address(end as u32)?;
		if start > end {
			return Err(BusError::InvalidRange { start, end }.into());
		}

		let mut buf = Vec::with_capacity((end - start) as usize + 1);
		for address in start..=end {
			buf.push(self.eeprom_read(address)?);
		}
		Ok(buf)
	}

	fn reset_bus(&mut self) {
		info!("resetting I2C bus");
		LowLevel::reset_bus(self);
	}
}

impl<H: ?Sized + Hardware> HardwareOperations for H {
}
