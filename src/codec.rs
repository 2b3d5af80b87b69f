//! Wire formats spoken to LED controllers

mod satellite;
pub use satellite::*;

mod serial;
pub use serial::*;

mod stream;
pub use stream::*;
