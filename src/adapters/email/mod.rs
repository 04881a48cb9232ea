//! Confirmation delivery adapters.

mod logging_sender;

pub use logging_sender::LoggingConfirmationSender;
