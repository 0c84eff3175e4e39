pub mod boundary;
pub mod config;
pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use boundary::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use traits::*;
pub use types::*;
