//! Notifications Domain
//!
//! Consumer side of the patient notification flow. Notification events
//! arrive over the notifications stream and leave through a
//! [`NotificationSink`]; the shipped sink writes to the log, a real
//! channel implements the same trait.
//!
//! Delivery is fire-and-forget by design: the processor acknowledges every
//! event it could hand to the sink, and a sink failure is logged rather
//! than pushed back into the stream for redelivery.

pub mod error;
pub mod processor;
pub mod sink;

// Re-export commonly used types
pub use error::{NotificationError, NotificationResult};
pub use processor::NotificationProcessor;
pub use sink::{LogNotificationSink, NotificationSink};
