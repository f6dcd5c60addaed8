pub mod caller;
pub mod location;
pub mod order;
pub mod participant;
pub mod pricing;
pub mod report;
pub mod ticket;
