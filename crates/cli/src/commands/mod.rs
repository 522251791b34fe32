pub mod account;
pub mod wallet;
