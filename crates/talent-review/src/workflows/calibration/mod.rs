//! Nine-box calibration fed by aggregated 360 composites.

pub mod movement;
pub mod nine_box;

use crate::workflows::evaluation360::domain::{CycleStatus, EmployeeId};

pub use movement::{record_movement, CalibrationMovement, MovementRequest};
pub use nine_box::{place, Level, NineBoxPosition, PerformanceThresholds, Placement};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("performance thresholds must satisfy medium_from < high_from (got {medium_from} and {high_from})")]
    InvalidThresholds { medium_from: f64, high_from: f64 },
    #[error("subject {subject_id} has no overall composite to place")]
    Unscored { subject_id: EmployeeId },
    #[error("movement justification must have at least {min} characters")]
    JustificationTooShort { min: usize },
    #[error("calibration is not open while the cycle is {status}")]
    CycleNotCalibratable { status: CycleStatus },
    #[error("movement does not change the nine-box position")]
    UnchangedPosition,
}
