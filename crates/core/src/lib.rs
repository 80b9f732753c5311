pub mod canonical;
pub mod error;
pub mod models;
pub mod signature;

pub use error::EbmsError;
pub use models::{
    DocumentKind, EbmsFields, EbmsStatus, GatewayResult, InvoiceRecord, LedgerState, MovementType,
    StockMovementRecord,
};
