pub mod candidate;
pub mod lookup;
pub mod message;
pub mod upload;
