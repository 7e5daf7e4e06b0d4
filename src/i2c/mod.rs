//! Bit-banged I²C master for a 24C16 EEPROM and a PCF8574A I/O expander.
//!
//! Two lines: CLK (driven by us only) and DATA (open-drain, also driven by
//! the device). DATA only changes while CLK is low, except for:
//! - START: DATA falls while CLK is high
//! - STOP: DATA rises while CLK is high
//!
//! Bytes go MSB first, followed by an acknowledge clock in which the
//! receiver pulls DATA low.
//!
//! 24C16 (16 kbit, organized as 8 blocks x 256 bytes):
//! - device address byte: 0b1010 + 3 block bits (memory address bits 10..8)
//!   + direction bit
//! - byte write: START, device (W), word address, data, STOP
//! - random read: START, device (W), word address, START, device (R), data,
//!   NACK, STOP
//!
//! PCF8574A: device address 0b0111_000, one data byte per transfer in
//! either direction.

mod error;
mod hardware;
mod low_level;
mod operations;

pub use self::error::BusError;

pub use self::hardware::{
	BusConfig,
	DataRelease,
	DEFAULT_ACK_POLL_LIMIT,
	Hardware,
	Line,
	reliable_sleep,
};

pub use self::low_level::LowLevel;

pub use self::operations::{
	check_address,
	check_data,
	DATA_MAX,
	EEPROM_ADDRESS_MAX,
	eeprom_address,
	HardwareOperations,
	IO_EXPANDER_READ_ADDRESS,
	IO_EXPANDER_WRITE_ADDRESS,
	Transaction,
};
