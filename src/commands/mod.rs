pub mod extract;
pub mod inventory;
pub mod reconcile;
pub mod status;
pub mod validate;
