use std::thread;
use std::time::{
	Duration,
	Instant,
};

// half of a 100 kHz (standard mode) clock period
const CLOCK_EDGE: Duration = Duration::from_micros(5);

pub const DEFAULT_ACK_POLL_LIMIT: usize = 1000;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Line {
	Clock,
	Data,
}

/// What `write_byte` leaves on the data line after the 8th bit.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum DataRelease {
	/// keep driving the data line low; any acknowledge then reads as low
	DriveLow,
	/// release the data line (open-drain "high"), as I²C expects before the
	/// acknowledge clock
	Release,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BusConfig {
	/// how often the data line gets sampled waiting for an acknowledge
	pub ack_poll_limit: usize,
	pub data_release: DataRelease,
}

impl Default for BusConfig {
	fn default() -> Self {
		BusConfig {
			ack_poll_limit: DEFAULT_ACK_POLL_LIMIT,
			data_release: DataRelease::DriveLow,
		}
	}
}

pub trait Hardware {
	fn set_line(&mut self, line: Line, level: bool);
	fn read_line(&mut self, line: Line) -> bool;

	// delay for (at least) one clock edge
	fn delay(&mut self) {
		reliable_sleep(CLOCK_EDGE);
	}

	fn bus_config(&self) -> BusConfig {
		BusConfig::default()
	}
}

impl<'a, H: ?Sized + Hardware> Hardware for &'a mut H {
	fn set_line(&mut self, line: Line, level: bool) {
		H::set_line(*self, line, level)
	}

	fn read_line(&mut self, line: Line) -> bool {
		H::read_line(*self, line)
	}

	fn delay(&mut self) {
		H::delay(*self)
	}

	fn bus_config(&self) -> BusConfig {
		H::bus_config(*self)
	}
}
