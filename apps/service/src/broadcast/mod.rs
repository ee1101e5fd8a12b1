/// Live status fan-out to subscriber connections
///
/// - `topics`: `service:<id>` / `environment:<id>` channels
/// - `messages`: the JSON wire protocol
/// - `registry`: connection bookkeeping and best-effort publishing
pub mod messages;
pub mod registry;
pub mod topics;

pub use messages::{ClientMessage, ServerMessage, StatusUpdate};
pub use registry::{ConnectionId, SubscriptionRegistry};
pub use topics::Topic;
