pub mod clock;
pub mod error;
pub mod fan_out;
pub mod key_allocator;
pub mod lifecycle;
pub mod record_store;
pub mod storage;
pub mod worker;
