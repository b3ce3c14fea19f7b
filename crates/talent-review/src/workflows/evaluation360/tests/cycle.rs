use chrono::Utc;

use super::common::*;
use crate::workflows::evaluation360::cycle::{
    check_transition, expected_roles, progress, subject_is_complete,
};
use crate::workflows::evaluation360::domain::{
    CycleStatus, Participant, RaterRole, RoleWeights,
};
use crate::workflows::evaluation360::error::EvaluationError;

#[test]
fn activation_succeeds_with_weights_summing_to_hundred() {
    let mut cycle = cycle(CycleStatus::Draft);
    let participants = roster(&cycle.id);

    cycle
        .activate(&participants, Utc::now())
        .expect("activation succeeds");

    assert_eq!(cycle.status, CycleStatus::Active);
    assert!(cycle.activated_at.is_some());
}

#[test]
fn activation_fails_when_weights_sum_to_ninety_five() {
    let mut cycle = cycle(CycleStatus::Draft);
    cycle.weights = RoleWeights::new(20.0, 40.0, 25.0, 10.0);
    let participants = roster(&cycle.id);

    match cycle.activate(&participants, Utc::now()) {
        Err(EvaluationError::InvalidWeightConfiguration { .. }) => {}
        other => panic!("expected invalid weights, got {other:?}"),
    }
    assert_eq!(cycle.status, CycleStatus::Draft);
    assert!(cycle.activated_at.is_none());
}

#[test]
fn activation_requires_scope_and_evaluated_participant() {
    let mut unscoped = cycle(CycleStatus::Draft);
    unscoped.competencies.clear();
    match unscoped.activate(&roster(&unscoped.id), Utc::now()) {
        Err(EvaluationError::MissingCompetencyScope) => {}
        other => panic!("expected missing scope, got {other:?}"),
    }

    let mut empty = cycle(CycleStatus::Draft);
    let raters_only: Vec<Participant> = roster(&empty.id)
        .into_iter()
        .filter(|participant| !participant.is_evaluated())
        .collect();
    match empty.activate(&raters_only, Utc::now()) {
        Err(EvaluationError::NoEvaluatedParticipants) => {}
        other => panic!("expected no evaluated participants, got {other:?}"),
    }
}

#[test]
fn archived_cycles_cannot_return_to_draft() {
    let mut cycle = cycle(CycleStatus::Archived);

    match cycle.transition_to(CycleStatus::Draft, &[], Utc::now()) {
        Err(EvaluationError::InvalidTransition { from, to }) => {
            assert_eq!(from, CycleStatus::Archived);
            assert_eq!(to, CycleStatus::Draft);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
    assert_eq!(cycle.status, CycleStatus::Archived);
}

#[test]
fn only_single_forward_steps_are_legal() {
    assert!(check_transition(CycleStatus::Draft, CycleStatus::Active).is_ok());
    assert!(check_transition(CycleStatus::Active, CycleStatus::Closed).is_ok());
    assert!(check_transition(CycleStatus::Closed, CycleStatus::Archived).is_ok());
    assert!(check_transition(CycleStatus::Draft, CycleStatus::Closed).is_err());
    assert!(check_transition(CycleStatus::Closed, CycleStatus::Active).is_err());
    assert!(check_transition(CycleStatus::Active, CycleStatus::Active).is_err());
}

#[test]
fn close_and_archive_stamp_timestamps() {
    let mut cycle = cycle(CycleStatus::Active);
    cycle.close(Utc::now()).expect("closes");
    assert!(cycle.closed_at.is_some());
    cycle.archive(Utc::now()).expect("archives");
    assert!(cycle.archived_at.is_some());
    assert_eq!(cycle.status, CycleStatus::Archived);
}

#[test]
fn weights_and_scope_freeze_after_draft() {
    let mut cycle = cycle(CycleStatus::Active);

    match cycle.update_weights(RoleWeights::new(25.0, 25.0, 25.0, 25.0)) {
        Err(EvaluationError::WeightsFrozen { status }) => assert_eq!(status, CycleStatus::Active),
        other => panic!("expected frozen weights, got {other:?}"),
    }
    match cycle.set_competencies(scope()) {
        Err(EvaluationError::ScopeFrozen { .. }) => {}
        other => panic!("expected frozen scope, got {other:?}"),
    }
}

#[test]
fn expected_roles_skip_unassigned_roles() {
    let cycle = cycle(CycleStatus::Active);
    let participants = roster(&cycle.id);

    let roles = expected_roles(&cycle, &employee("ana"), &participants).expect("valid weights");

    assert_eq!(
        roles,
        vec![RaterRole::SelfReview, RaterRole::Manager, RaterRole::Peer]
    );
}

#[test]
fn subject_completes_once_every_expected_role_rated_every_competency() {
    let cycle = cycle(CycleStatus::Active);
    let participants = roster(&cycle.id);
    let mut ratings = Vec::new();
    for competency_id in ["communication", "leadership", "delivery"] {
        ratings.push(rating(&cycle, "ana", "ana", RaterRole::SelfReview, competency_id, 4));
        ratings.push(rating(&cycle, "ana", "bruno", RaterRole::Manager, competency_id, 4));
    }

    assert!(!subject_is_complete(&cycle, &employee("ana"), &participants, &ratings)
        .expect("valid weights"));

    for competency_id in ["communication", "leadership", "delivery"] {
        ratings.push(rating(&cycle, "ana", "carla", RaterRole::Peer, competency_id, 3));
    }
    assert!(subject_is_complete(&cycle, &employee("ana"), &participants, &ratings)
        .expect("valid weights"));
}

#[test]
fn progress_reports_pending_subjects() {
    let cycle = cycle(CycleStatus::Active);
    let mut participants = roster(&cycle.id);
    participants.push(Participant::evaluated(cycle.id.clone(), employee("eva")));
    participants[0].mark_complete(Utc::now());

    let summary = progress(&cycle, &participants);

    assert_eq!(summary.evaluated_total, 2);
    assert_eq!(summary.evaluated_complete, 1);
    assert_eq!(summary.assignments_total, 3);
    assert_eq!(summary.completion_pct, Some(50.0));
    assert_eq!(summary.pending_subjects, vec![employee("eva")]);
}

#[test]
fn completion_flag_flips_once() {
    let cycle = cycle(CycleStatus::Active);
    let mut participant = Participant::evaluated(cycle.id.clone(), employee("ana"));
    let first = Utc::now();

    assert!(participant.mark_complete(first));
    assert!(!participant.mark_complete(Utc::now()));
    assert_eq!(participant.completed_at, Some(first));
}
