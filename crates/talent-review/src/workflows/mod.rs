pub mod approvals;
pub mod calibration;
pub mod evaluation360;
pub mod surveys;
