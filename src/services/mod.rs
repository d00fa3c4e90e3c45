// Stock contract over the catalog
pub mod catalog;

// Buyer-facing order lifecycle
pub mod cart;
pub mod orders;
pub mod payments;

// After-sales
pub mod refunds;
pub mod returns;

// Side effects
pub mod notifications;
