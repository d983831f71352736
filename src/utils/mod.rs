pub mod signals;

pub use signals::handle_signals;
