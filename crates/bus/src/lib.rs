pub mod broker;
pub mod error;
pub mod pubsub;
pub mod subject;
pub mod traits;
pub mod transport;

pub use broker::{BrokerConfig, EventBroker};
pub use error::BusError;
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use subject::{validate_agent_id, SubjectMap, DEFAULT_SUBJECT_PREFIX};
pub use traits::{BusMessage, EventPublisher, EventSubscriber};
pub use transport::Transport;
