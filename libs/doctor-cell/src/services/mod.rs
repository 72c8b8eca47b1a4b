pub mod calendar;
pub mod directory;

pub use calendar::WorkingHoursCalendar;
pub use directory::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
