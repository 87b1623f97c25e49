mod push;

pub use push::receive_push;
