pub mod console;
pub mod error;
pub mod hooks;
pub mod memdump;
pub mod settings;
pub mod simulator;
pub mod syscalls;

pub use error::{EmuError, RuntimeError};
pub use settings::Settings;
pub use simulator::{Outcome, Simulator, StopHandle};
