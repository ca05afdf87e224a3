pub mod login;
pub mod modes;
