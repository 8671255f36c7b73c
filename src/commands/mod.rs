pub mod check;
pub mod outline;
pub mod serve;

pub use check::execute_check;
pub use outline::execute_outline;
pub use serve::execute_serve;
