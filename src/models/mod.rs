pub mod event;
pub mod money;
pub mod payout;
pub mod response;
pub mod transaction;

pub use event::*;
pub use money::*;
pub use payout::*;
pub use response::*;
pub use transaction::*;
