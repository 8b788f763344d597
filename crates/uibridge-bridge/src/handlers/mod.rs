pub mod system;

pub use system::SystemCommandSet;
