//! Connection domain models and repository ports.

mod model;
mod traits;

pub use model::{Connection, ConnectionRequest, ConnectionRequestStatus};
pub use traits::{ConnectionRepositoryTrait, ConnectionRequestRepositoryTrait};
