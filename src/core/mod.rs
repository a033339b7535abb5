pub mod codec;
pub mod error;
pub mod format;
pub mod session;
pub mod upload;
pub mod yolo;
