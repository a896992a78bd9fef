pub mod alert;
pub mod clock;
pub mod error;
pub mod outage;
pub mod queue;
pub mod stage;
