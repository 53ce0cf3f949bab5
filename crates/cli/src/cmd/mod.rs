pub mod enqueue;
pub mod show;
pub mod tick;
