pub mod audit;
pub mod inventory;
pub mod requests;
