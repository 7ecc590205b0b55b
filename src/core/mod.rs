pub mod errors;
pub mod helpers;
pub mod store;
pub mod token;
