use super::{
	BusError,
	DataRelease,
	Hardware,
	Line,
};

const MSB_MASK: u8 = 0x80;

// enough clocks to make any device finish a byte and its acknowledge
const RESET_CLOCK_PULSES: usize = 9;

pub trait LowLevel: Hardware {
	// change a line, then wait an edge so the device can follow
	fn drive(&mut self, line: Line, level: bool) {
		self.set_line(line, level);
		self.delay();
	}

	fn clock_pulse(&mut self) {
		self.drive(Line::Clock, true);
		self.drive(Line::Clock, false);
	}

	// send byte, starting with highest bit; data is set while CLK is low
	fn write_byte(&mut self, mut value: u8) {
		for _ in 0..8 {
			self.drive(Line::Data, 0 != value & MSB_MASK);
			self.clock_pulse();
			value <<= 1;
		}
		let level = match self.bus_config().data_release {
			DataRelease::DriveLow => false,
			DataRelease::Release => true,
		};
		self.drive(Line::Data, level);
	}

	// receive byte, starting with highest bit; sampled while CLK is high
	fn read_byte(&mut self) -> u8 {
		// release DATA so the device can drive it
		self.drive(Line::Data, true);

		let mut value = 0u8;
		for _ in 0..8 {
			self.drive(Line::Clock, true);
			value = (value << 1) | (self.read_line(Line::Data) as u8);
			self.drive(Line::Clock, false);
		}
		value
	}

	// DATA falls while CLK is high
	fn start(&mut self) {
		self.drive(Line::Data, true);
		self.drive(Line::Clock, true);
		self.drive(Line::Data, false);
		self.drive(Line::Clock, false);
	}

	// DATA rises while CLK is high
	fn stop(&mut self) {
		self.drive(Line::Data, false);
		self.drive(Line::Clock, true);
		self.drive(Line::Data, true);
		self.drive(Line::Clock, false);
	}

	/// Clock the acknowledge bit of the device.
	///
	/// The device holds DATA low only until the falling edge, so DATA is
	/// polled (at most `ack_poll_limit` times) while CLK is high. The line
	/// transitions are the same as for `clock_pulse`.
	fn wait_ack(&mut self) -> crate::AResult<()> {
		let polls = self.bus_config().ack_poll_limit.max(1);

		self.drive(Line::Clock, true);
		let mut acked = false;
		for _ in 0..polls {
			if !self.read_line(Line::Data) {
				acked = true;
				break;
			}
			self.delay();
		}
		self.drive(Line::Clock, false);

		if !acked {
			warn!("no acknowledge after {} polls", polls);
			return Err(BusError::AckTimeout { polls }.into());
		}
		Ok(())
	}

	// acknowledge a received byte: more data may follow
	fn send_ack(&mut self) {
		self.drive(Line::Clock, false);
		self.drive(Line::Data, false);
		self.clock_pulse();
		self.drive(Line::Data, true);
	}

	// no acknowledge: the read phase ends here
	fn send_nack(&mut self) {
		self.drive(Line::Clock, false);
		self.drive(Line::Data, true);
		self.drive(Line::Clock, true);
		self.drive(Line::Data, false);
	}

	/// Get a device out of a half-finished transfer: it sees a start, then
	/// enough clocks with DATA high to complete (and not acknowledge) any
	/// byte, then an empty start/stop frame.
	fn reset_bus(&mut self) {
		debug!("resetting bus");
		self.start();
		for _ in 0..RESET_CLOCK_PULSES {
			self.drive(Line::Data, true);
			self.clock_pulse();
		}
		self.start();
		self.stop();
	}
}

impl<H: Hardware + ?Sized> LowLevel for H {
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i2c::BusConfig;
	use crate::sim::{
		Event,
		SimulatedBus,
	};

	use std::collections::VecDeque;

	/// Returns scripted DATA levels on reads, no device logic.
	struct Scripted {
		data: VecDeque<bool>,
		config: BusConfig,
		sets: Vec<(Line, bool)>,
		reads: usize,
	}

	impl Scripted {
		fn new(data: &[bool]) -> Self {
			Scripted {
				data: data.iter().cloned().collect(),
				config: BusConfig::default(),
				sets: Vec::new(),
				reads: 0,
			}
		}
	}

	impl Hardware for Scripted {
		fn set_line(&mut self, line: Line, level: bool) {
			self.sets.push((line, level));
		}

		fn read_line(&mut self, _line: Line) -> bool {
			self.reads += 1;
			self.data.pop_front().unwrap_or(true)
		}

		fn delay(&mut self) {
		}

		fn bus_config(&self) -> BusConfig {
			self.config
		}
	}

	fn clock_pulses(events: &[Event]) -> usize {
		events.iter().filter(|e| **e == Event::Set(Line::Clock, true)).count()
	}

	#[test]
	fn write_byte_msb_first() {
		let mut bus = SimulatedBus::new();
		bus.write_byte(0xa5);
		let trace = bus.trace().to_vec();

		assert_eq!(clock_pulses(&trace), 8);

		// DATA level at each rising CLK edge
		let mut data = true;
		let mut bits = Vec::new();
		for e in &trace {
			match *e {
				Event::Set(Line::Data, level) => data = level,
				Event::Set(Line::Clock, true) => bits.push(data as u8),
				_ => (),
			}
		}
		assert_eq!(bits, vec![1, 0, 1, 0, 0, 1, 0, 1]);

		// DATA driven low after the last bit
		assert_eq!(trace.last(), Some(&Event::Set(Line::Data, false)));
	}

	#[test]
	fn write_byte_release_leaves_data_high() {
		let mut bus = SimulatedBus::new();
		bus.set_bus_config(BusConfig {
			data_release: DataRelease::Release,
			..BusConfig::default()
		});
		bus.write_byte(0x00);
		assert_eq!(bus.trace().last(), Some(&Event::Set(Line::Data, true)));
	}

	#[test]
	fn read_byte_samples_while_clock_high() {
		let mut hw = Scripted::new(&[false, true, true, false, false, false, true, false]);
		assert_eq!(hw.read_byte(), 0x62);
		assert_eq!(hw.reads, 8);

		// DATA released first, then CLK up / CLK down per bit
		assert_eq!(hw.sets[0], (Line::Data, true));
		for bit in 0..8 {
			assert_eq!(hw.sets[1 + 2 * bit], (Line::Clock, true));
			assert_eq!(hw.sets[2 + 2 * bit], (Line::Clock, false));
		}
		assert_eq!(hw.sets.len(), 17);
	}

	#[test]
	fn start_stop_sequence() {
		let mut bus = SimulatedBus::new();
		bus.start();
		bus.stop();
		assert_eq!(bus.trace(), &[
			Event::Set(Line::Data, true),
			Event::Set(Line::Clock, true),
			Event::Set(Line::Data, false),
			Event::Set(Line::Clock, false),
			Event::Set(Line::Data, false),
			Event::Set(Line::Clock, true),
			Event::Set(Line::Data, true),
			Event::Set(Line::Clock, false),
		][..]);
	}

	#[test]
	fn reset_bus_sequence() {
		let mut hw = Scripted::new(&[]);
		hw.reset_bus();

		let start = [
			(Line::Data, true),
			(Line::Clock, true),
			(Line::Data, false),
			(Line::Clock, false),
		];
		let stop = [
			(Line::Data, false),
			(Line::Clock, true),
			(Line::Data, true),
			(Line::Clock, false),
		];

		assert_eq!(&hw.sets[..4], &start[..]);
		let pulses = &hw.sets[4..4 + 27];
		for chunk in pulses.chunks(3) {
			assert_eq!(chunk, &[(Line::Data, true), (Line::Clock, true), (Line::Clock, false)][..]);
		}
		assert_eq!(&hw.sets[31..35], &start[..]);
		assert_eq!(&hw.sets[35..], &stop[..]);
		assert_eq!(hw.reads, 0);
	}

	#[test]
	fn wait_ack_accepts_low_data() {
		let mut hw = Scripted::new(&[true, true, false]);
		hw.wait_ack().unwrap();
		assert_eq!(hw.reads, 3);
		assert_eq!(hw.sets, vec![(Line::Clock, true), (Line::Clock, false)]);
	}

	#[test]
	fn wait_ack_times_out() {
		let mut hw = Scripted::new(&[]);
		hw.config.ack_poll_limit = 5;
		let err = hw.wait_ack().unwrap_err();
		assert_eq!(err.downcast_ref::<BusError>(), Some(&BusError::AckTimeout { polls: 5 }));
		assert_eq!(hw.reads, 5);
		// CLK must not be left high
		assert_eq!(hw.sets.last(), Some(&(Line::Clock, false)));
	}

	#[test]
	fn send_ack_and_nack_sequences() {
		let mut hw = Scripted::new(&[]);
		hw.send_ack();
		assert_eq!(hw.sets, vec![
			(Line::Clock, false),
			(Line::Data, false),
			(Line::Clock, true),
			(Line::Clock, false),
			(Line::Data, true),
		]);

		let mut hw = Scripted::new(&[]);
		hw.send_nack();
		assert_eq!(hw.sets, vec![
			(Line::Clock, false),
			(Line::Data, true),
			(Line::Clock, true),
			(Line::Data, false),
		]);
	}
}
