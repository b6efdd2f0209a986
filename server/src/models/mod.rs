pub mod checkin_log;
pub mod performance;
pub mod production;
pub mod reservation;

pub use checkin_log::{CheckinLogEntry, CheckinLogType, PaymentBreakdown};
pub use performance::{Availability, Performance};
pub use production::{Production, ReceptionConfig, ReceptionEndMode, ReceptionStatus, TicketType};
pub use reservation::{
    CheckinStatus, Customer, PaymentStatus, Reservation, ReservationSource, ReservationStatus,
    ReservationView, TicketLine,
};
