pub mod credential;
pub mod order;
pub mod payment;
pub mod stats;
pub mod ticket;
pub mod tier;

pub use credential::CredentialPayload;
pub use order::Order;
pub use payment::{PaymentCallback, PaymentSession, PaymentStatus, VerifiedPayment, VerifyOutcome};
pub use stats::{GateStats, TicketCounts};
pub use ticket::{AdmissionState, NewTicket, Ticket};
pub use tier::TicketTier;
