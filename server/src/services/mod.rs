pub mod booking;
pub mod box_office;
pub mod catalog;
pub mod clock;
pub mod ledger;
pub mod reception;

pub use box_office::BoxOffice;
pub use clock::{Clock, FixedClock, SystemClock};
pub use reception::{EffectiveReceptionStatus, ReceptionEvaluator};
