pub mod appointment;
pub mod availability;
pub mod commission;
pub mod enums;
pub mod inventory;
pub mod procedure;
pub mod professional;

pub use appointment::*;
pub use availability::*;
pub use commission::*;
pub use inventory::*;
pub use procedure::*;
pub use professional::*;
