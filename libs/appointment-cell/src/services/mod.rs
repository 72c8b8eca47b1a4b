pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod reminder;

pub use availability::{AvailabilityService, AvailabilitySlotGenerator, MAX_SLOT_DURATION_MINUTES};
pub use booking::AppointmentService;
pub use conflict::{intervals_overlap, ConflictDetector};
pub use lifecycle::{AppointmentLifecycle, LifecycleAction, MIN_DURATION_MINUTES};
pub use reminder::{build_payload, ReminderScheduler, ReminderService};
