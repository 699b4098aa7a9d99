//! Employee leave requests.

pub mod request;

pub use request::{
    ApproveLeave, CreateLeaveRequest, LeaveCommand, LeaveEvent, LeaveRequest, LeaveRequestCreated,
    LeaveRequestId, LeaveStatus, LeaveType, RejectLeave,
};
