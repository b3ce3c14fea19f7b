use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::nine_box::NineBoxPosition;
use super::CalibrationError;
use crate::workflows::evaluation360::domain::{Cycle, CycleId, CycleStatus, EmployeeId};

pub const MIN_JUSTIFICATION_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub employee_id: EmployeeId,
    pub moved_by: EmployeeId,
    #[serde(default)]
    pub from: Option<NineBoxPosition>,
    pub to: NineBoxPosition,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMovement {
    pub cycle_id: CycleId,
    pub employee_id: EmployeeId,
    pub moved_by: EmployeeId,
    pub from: Option<NineBoxPosition>,
    pub to: NineBoxPosition,
    pub from_box: Option<String>,
    pub to_box: String,
    pub justification: String,
    pub recorded_at: DateTime<Utc>,
}

/// Validate a manual nine-box move during calibration.
pub fn record_movement(
    cycle: &Cycle,
    request: MovementRequest,
    now: DateTime<Utc>,
) -> Result<CalibrationMovement, CalibrationError> {
    if !matches!(cycle.status, CycleStatus::Active | CycleStatus::Closed) {
        return Err(CalibrationError::CycleNotCalibratable {
            status: cycle.status,
        });
    }

    let justification = request.justification.trim();
    if justification.chars().count() < MIN_JUSTIFICATION_CHARS {
        return Err(CalibrationError::JustificationTooShort {
            min: MIN_JUSTIFICATION_CHARS,
        });
    }
    if request.from == Some(request.to) {
        return Err(CalibrationError::UnchangedPosition);
    }

    let movement = CalibrationMovement {
        cycle_id: cycle.id.clone(),
        employee_id: request.employee_id,
        moved_by: request.moved_by,
        from_box: request.from.map(|position| position.box_key()),
        to_box: request.to.box_key(),
        from: request.from,
        to: request.to,
        justification: justification.to_string(),
        recorded_at: now,
    };
    info!(
        cycle_id = %movement.cycle_id,
        employee_id = %movement.employee_id,
        to = %movement.to_box,
        "calibration movement recorded"
    );
    Ok(movement)
}
