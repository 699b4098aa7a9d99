//! Booking scheduling and lifecycle.

pub mod booking;

pub use booking::{
    AddNote, AssignInspector, Booking, BookingCommand, BookingCreated, BookingEvent, BookingId,
    BookingNote, BookingStatus, ChangeBookingStatus, CreateBooking, TimeSlot,
};
