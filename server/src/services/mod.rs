pub mod admission;
pub mod credential;
pub mod issuer;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod signing;
pub mod stats;

pub use admission::{AdmissionAction, AdmissionController, ScanResolution};
pub use credential::{CredentialCodec, CredentialSigner, QrCodec};
pub use issuer::{IssuedTicket, TicketIssuer};
pub use order::OrderBuilder;
pub use payment::PaymentSessionManager;
pub use pricing::PricingTable;
pub use stats::StatsAggregator;
