// OS-specific. for now linux (sysfs) only.
mod bus;
mod pin;

pub use self::bus::{
	open_bus,
	SysfsBus,
};

pub use self::pin::GpioPin;
