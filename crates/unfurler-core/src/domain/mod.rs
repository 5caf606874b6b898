//! Domain model (ids, job records, firing strategy, errors).

pub mod errors;
pub mod fire_at;
pub mod handler_name;
pub mod ids;
pub mod job;

pub use self::errors::{ClientError, ErrorKind, JobError};
pub use self::fire_at::FireAt;
pub use self::handler_name::HandlerName;
pub use self::ids::{ClaimToken, EventId, TriggerId};
pub use self::job::{JobRecord, JobState};
