use failure::Fail;

/// Conditions callers may want to tell apart; everything else is a plain
/// `failure::Error` message.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum BusError {
	#[fail(display = "no acknowledge from device after {} polls", polls)]
	AckTimeout {
		polls: usize,
	},
	#[fail(display = "Invalid Address Range: 0x{:x} (address has to be between 0x000 and 0x7FF)", address)]
	AddressOutOfRange {
		address: u32,
	},
	#[fail(display = "Invalid Data Range: 0x{:x} (data has to be between 0x00 and 0xFF)", data)]
	DataOutOfRange {
		data: u32,
	},
	#[fail(display = "Invalid range: start 0x{:03x} is after end 0x{:03x}", start, end)]
	InvalidRange {
		start: u16,
		end: u16,
	},
}

impl BusError {
	/// whether `err` is (or wraps) a `BusError::AckTimeout`
	pub fn is_ack_timeout(err: &failure::Error) -> bool {
		match err.downcast_ref::<BusError>() {
			Some(BusError::AckTimeout { .. }) => true,
			_ => false,
		}
	}
}
