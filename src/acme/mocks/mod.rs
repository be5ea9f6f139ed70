pub mod client_mock;
pub mod scripted;
