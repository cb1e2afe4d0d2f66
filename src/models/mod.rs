pub mod appointment;
pub mod schedule;
pub mod service;

pub use appointment::{
    Appointment, AppointmentStatus, BookAppointmentRequest, NewAppointment,
    UpdateAppointmentRequest,
};
pub use schedule::{CreateScheduleRequest, NewScheduleSlot, ScheduleSlot, UpdateScheduleRequest};
pub use service::{CreateServiceRequest, ServiceInfo};
