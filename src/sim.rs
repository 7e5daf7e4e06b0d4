//! Simulated I²C bus with a 24C16 EEPROM and a PCF8574A I/O expander.
//!
//! The devices follow the lines as the master drives them: they detect
//! START / STOP on DATA changes while CLK is high, shift bits in on the
//! rising CLK edge and change their own DATA output on the falling edge.
//! DATA is wired-AND: reading it returns low if either side pulls it low.
//!
//! Every `set_line` / `read_line` call is recorded, so tests can check the
//! exact line sequence of an operation.

use std::mem;

use crate::i2c::{
	BusConfig,
	Hardware,
	Line,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
	Set(Line, bool),
	Read(Line, bool),
}

/// A byte as it went over the bus (in either direction), and whether the
/// receiving side acknowledged it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BusByte {
	pub byte: u8,
	pub acked: bool,
}

pub trait SimDevice {
	/// whether the device answers to the 7-bit `address`
	fn responds_to(&self, address: u8) -> bool;
	/// addressed after a START; `read` is the direction bit
	fn select(&mut self, address: u8, read: bool);
	/// byte from the master; returns whether to acknowledge it
	fn write(&mut self, data: u8) -> bool;
	/// next byte for the master
	fn read(&mut self) -> u8;
	fn stop(&mut self) {
	}
}

pub const EEPROM_SIZE: usize = 0x800;
const EEPROM_PAGE_MASK: u16 = 0x0f;

/// 16-kbit EEPROM: 8 blocks of 256 bytes, the block selected by the low
/// three bits of the 7-bit device address (0x50..0x57).
pub struct Eeprom24c16 {
	memory: Vec<u8>,
	pointer: u16,
	block: u16,
	expect_word_address: bool,
}

impl Eeprom24c16 {
	pub fn new() -> Self {
		Eeprom24c16 {
			memory: vec![0xff; EEPROM_SIZE],
			pointer: 0,
			block: 0,
			expect_word_address: false,
		}
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}
}

impl Default for Eeprom24c16 {
	fn default() -> Self {
		Self::new()
	}
}

impl SimDevice for Eeprom24c16 {
	fn responds_to(&self, address: u8) -> bool {
		address & 0x78 == 0x50
	}

	fn select(&mut self, address: u8, read: bool) {
		self.block = (address & 0x07) as u16;
		self.expect_word_address = !read;
	}

	fn write(&mut self, data: u8) -> bool {
		if self.expect_word_address {
			self.pointer = self.block << 8 | data as u16;
			self.expect_word_address = false;
		} else {
			self.memory[self.pointer as usize] = data;
			// page write: address counter wraps within the 16-byte page
			self.pointer = (self.pointer & !EEPROM_PAGE_MASK) | ((self.pointer + 1) & EEPROM_PAGE_MASK);
		}
		true
	}

	fn read(&mut self) -> u8 {
		let data = self.memory[self.pointer as usize];
		self.pointer = (self.pointer + 1) % EEPROM_SIZE as u16;
		data
	}
}

/// 8-bit quasi-bidirectional port: a pin reads low if either the output
/// latch or the outside world pulls it low.
pub struct Pcf8574a {
	latch: u8,
	inputs: u8,
}

impl Pcf8574a {
	pub const ADDRESS: u8 = 0x38;

	pub fn new() -> Self {
		Pcf8574a {
			latch: 0xff,
			inputs: 0xff,
		}
	}

	pub fn latch(&self) -> u8 {
		self.latch
	}

	pub fn set_inputs(&mut self, inputs: u8) {
		self.inputs = inputs;
	}
}

impl Default for Pcf8574a {
	fn default() -> Self {
		Self::new()
	}
}

impl SimDevice for Pcf8574a {
	fn responds_to(&self, address: u8) -> bool {
		address == Self::ADDRESS
	}

	fn select(&mut self, _address: u8, _read: bool) {
	}

	fn write(&mut self, data: u8) -> bool {
		self.latch = data;
		true
	}

	fn read(&mut self) -> u8 {
		self.latch & self.inputs
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Target {
	Eeprom,
	Expander,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
	Idle,
	// shifting in a byte from the master
	Receive { byte: u8, bits: u8, address: bool },
	// device holds DATA low for the acknowledge clock
	Ack { read: bool },
	// shifting out a byte to the master; `bits` already clocked
	Transmit { byte: u8, bits: u8 },
	// master acknowledges (or not) the byte just sent
	MasterAck { byte: u8, acked: Option<bool> },
}

pub struct SimulatedBus {
	clock: bool,
	data: bool,
	device_data: bool,
	phase: Phase,
	selected: Option<Target>,
	eeprom: Option<Eeprom24c16>,
	expander: Option<Pcf8574a>,
	config: BusConfig,
	trace: Vec<Event>,
	bytes: Vec<BusByte>,
	transitions: usize,
}

impl SimulatedBus {
	/// bus without any device
	pub fn new() -> Self {
		SimulatedBus {
			clock: true,
			data: true,
			device_data: true,
			phase: Phase::Idle,
			selected: None,
			eeprom: None,
			expander: None,
			config: BusConfig::default(),
			trace: Vec::new(),
			bytes: Vec::new(),
			transitions: 0,
		}
	}

	/// bus with both an EEPROM and an I/O expander attached
	pub fn with_devices() -> Self {
		let mut bus = Self::new();
		bus.eeprom = Some(Eeprom24c16::new());
		bus.expander = Some(Pcf8574a::new());
		bus
	}

	pub fn set_bus_config(&mut self, config: BusConfig) {
		self.config = config;
	}

	pub fn attach_eeprom(&mut self, eeprom: Eeprom24c16) {
		self.eeprom = Some(eeprom);
	}

	pub fn attach_expander(&mut self, expander: Pcf8574a) {
		self.expander = Some(expander);
	}

	pub fn eeprom(&self) -> Option<&Eeprom24c16> {
		self.eeprom.as_ref()
	}

	pub fn eeprom_mut(&mut self) -> Option<&mut Eeprom24c16> {
		self.eeprom.as_mut()
	}

	pub fn expander(&self) -> Option<&Pcf8574a> {
		self.expander.as_ref()
	}

	pub fn expander_mut(&mut self) -> Option<&mut Pcf8574a> {
		self.expander.as_mut()
	}

	pub fn trace(&self) -> &[Event] {
		&self.trace
	}

	/// bytes seen on the bus since the last `clear_trace`
	pub fn bytes(&self) -> &[BusByte] {
		&self.bytes
	}

	/// number of `set_line` calls since the last `clear_trace`
	pub fn transitions(&self) -> usize {
		self.transitions
	}

	pub fn clear_trace(&mut self) {
		self.trace.clear();
		self.bytes.clear();
		self.transitions = 0;
	}

	fn device(&mut self, target: Target) -> Option<&mut dyn SimDevice> {
		match target {
			Target::Eeprom => self.eeprom.as_mut().map(|d| d as &mut dyn SimDevice),
			Target::Expander => self.expander.as_mut().map(|d| d as &mut dyn SimDevice),
		}
	}

	fn find_device(&self, address: u8) -> Option<Target> {
		if self.eeprom.as_ref().map_or(false, |d| d.responds_to(address)) {
			Some(Target::Eeprom)
		} else if self.expander.as_ref().map_or(false, |d| d.responds_to(address)) {
			Some(Target::Expander)
		} else {
			None
		}
	}

	// a START / STOP right after the master acknowledge clock (the NACK
	// sequence ends like that) still completes the transmitted byte
	fn finish_phase(&mut self) {
		if let Phase::MasterAck { byte, acked: Some(acked) } = self.phase {
			self.bytes.push(BusByte { byte, acked });
		}
	}

	fn start_condition(&mut self) {
		trace!("sim: START");
		self.finish_phase();
		self.selected = None;
		self.device_data = true;
		self.phase = Phase::Receive { byte: 0, bits: 0, address: true };
	}

	fn stop_condition(&mut self) {
		trace!("sim: STOP");
		self.finish_phase();
		if let Some(target) = self.selected.take() {
			if let Some(device) = self.device(target) {
				device.stop();
			}
		}
		self.device_data = true;
		self.phase = Phase::Idle;
	}

	fn clock_rising(&mut self) {
		let data = self.data;
		match self.phase {
			Phase::Receive { ref mut byte, ref mut bits, .. } => {
				if *bits < 8 {
					*byte = (*byte << 1) | data as u8;
					*bits += 1;
				}
			},
			Phase::MasterAck { ref mut acked, .. } => {
				*acked = Some(!data);
			},
			_ => (),
		}
	}

	fn clock_falling(&mut self) {
		let phase = mem::replace(&mut self.phase, Phase::Idle);
		self.phase = match phase {
			Phase::Receive { byte, bits: 8, address: true } => {
				let address = byte >> 1;
				let read = 0 != byte & 0x01;
				self.selected = self.find_device(address);
				match self.selected {
					Some(target) => {
						if let Some(device) = self.device(target) {
							device.select(address, read);
						}
						self.bytes.push(BusByte { byte, acked: true });
						self.device_data = false;
						Phase::Ack { read }
					},
					None => {
						self.bytes.push(BusByte { byte, acked: false });
						Phase::Idle
					},
				}
			},
			Phase::Receive { byte, bits: 8, address: false } => {
				let acked = match self.selected {
					Some(target) => self.device(target).map_or(false, |d| d.write(byte)),
					None => false,
				};
				self.bytes.push(BusByte { byte, acked });
				if acked {
					self.device_data = false;
					Phase::Ack { read: false }
				} else {
					Phase::Idle
				}
			},
			Phase::Ack { read: false } => {
				self.device_data = true;
				Phase::Receive { byte: 0, bits: 0, address: false }
			},
			Phase::Ack { read: true } => self.load_transmit(),
			Phase::Transmit { byte, bits } => {
				let bits = bits + 1;
				if bits == 8 {
					self.device_data = true;
					Phase::MasterAck { byte, acked: None }
				} else {
					self.device_data = 0 != (byte << bits) & 0x80;
					Phase::Transmit { byte, bits }
				}
			},
			Phase::MasterAck { byte, acked: Some(acked) } => {
				self.bytes.push(BusByte { byte, acked });
				if acked {
					self.load_transmit()
				} else {
					Phase::Idle
				}
			},
			other => other,
		};
	}

	fn load_transmit(&mut self) -> Phase {
		let byte = match self.selected {
			Some(target) => self.device(target).map_or(0xff, |d| d.read()),
			None => 0xff,
		};
		self.device_data = 0 != byte & 0x80;
		Phase::Transmit { byte, bits: 0 }
	}
}

impl Default for SimulatedBus {
	fn default() -> Self {
		Self::new()
	}
}

impl Hardware for SimulatedBus {
	fn set_line(&mut self, line: Line, level: bool) {
		self.trace.push(Event::Set(line, level));
		self.transitions += 1;

		match line {
			Line::Clock => {
				let previous = mem::replace(&mut self.clock, level);
				match (previous, level) {
					(false, true) => self.clock_rising(),
					(true, false) => self.clock_falling(),
					_ => (),
				}
			},
			Line::Data => {
				let previous = mem::replace(&mut self.data, level);
				if self.clock {
					match (previous, level) {
						(true, false) => self.start_condition(),
						(false, true) => self.stop_condition(),
						_ => (),
					}
				}
			},
		}
	}

	fn read_line(&mut self, line: Line) -> bool {
		let level = match line {
			Line::Clock => self.clock,
			Line::Data => self.data && self.device_data,
		};
		self.trace.push(Event::Read(line, level));
		level
	}

	fn delay(&mut self) {
	}

	fn bus_config(&self) -> BusConfig {
		self.config
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i2c::{
		BusError,
		DataRelease,
		LowLevel,
		Transaction,
	};

	#[test]
	fn page_write_wraps_within_page() {
		let mut bus = SimulatedBus::with_devices();
		{
			let mut tx = Transaction::start(&mut bus);
			tx.send(0xa2).unwrap();
			tx.send(0x1e).unwrap();
			for b in 1..=3 {
				tx.send(b).unwrap();
			}
		}
		let memory = bus.eeprom().unwrap().memory();
		assert_eq!(&memory[0x11e..0x120], &[1, 2][..]);
		assert_eq!(memory[0x110], 3);
		assert_eq!(memory[0x120], 0xff);
	}

	#[test]
	fn sequential_read_wraps_at_end_of_memory() {
		let mut bus = SimulatedBus::with_devices();
		{
			let memory = bus.eeprom_mut().unwrap().memory_mut();
			memory[0x7fe] = 0x11;
			memory[0x7ff] = 0x22;
			memory[0x000] = 0x33;
		}

		let data = {
			let mut tx = Transaction::start(&mut bus);
			tx.send(0xae).unwrap();
			tx.send(0xfe).unwrap();
			tx.repeated_start();
			tx.send(0xaf).unwrap();
			vec![tx.receive(), tx.receive(), tx.receive_last()]
		};
		assert_eq!(data, vec![0x11, 0x22, 0x33]);
		assert_eq!(bus.bytes().last(), Some(&BusByte { byte: 0x33, acked: false }));
	}

	#[test]
	fn unknown_address_is_not_acknowledged() {
		let mut bus = SimulatedBus::with_devices();
		bus.set_bus_config(BusConfig {
			ack_poll_limit: 1,
			data_release: DataRelease::Release,
		});

		bus.start();
		bus.write_byte(0x90);
		let err = bus.wait_ack().unwrap_err();
		assert_eq!(err.downcast_ref::<BusError>(), Some(&BusError::AckTimeout { polls: 1 }));
		bus.stop();

		assert_eq!(bus.bytes(), &[BusByte { byte: 0x90, acked: false }][..]);
	}

	#[test]
	fn data_line_is_wired_and() {
		let mut bus = SimulatedBus::with_devices();
		assert!(bus.read_line(Line::Data));
		bus.set_line(Line::Data, false);
		assert!(!bus.read_line(Line::Data));
		assert_eq!(bus.trace(), &[
			Event::Read(Line::Data, true),
			Event::Set(Line::Data, false),
			Event::Read(Line::Data, false),
		][..]);
		assert_eq!(bus.transitions(), 1);
	}
}
