use crate::infra::{parse_date, InMemoryCycleRepository, InMemoryReviewNotifier};
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use talent_review::config::parse_divergence_threshold;
use talent_review::error::AppError;
use talent_review::workflows::approvals::{
    ApprovalAction, ApprovalChain, ApprovalLevel, ApprovalRequest, Decision, RequestId,
};
use talent_review::workflows::calibration::{
    place, record_movement, Level, MovementRequest, NineBoxPosition, PerformanceThresholds,
};
use talent_review::workflows::evaluation360::{
    aggregate, CompetencyId, CompetencyRating, ConsensusOutcome, ConsensusPolicy, Cycle,
    CycleDraft, CycleId, CycleKind, CycleServiceError, CycleStatus, EmployeeId,
    EvaluationCycleService, ParticipationRole, RaterRole, RatingCsvImporter, RatingEntry,
    RatingScale, RatingSubmission, ReviewDecision, RoleWeights, ScopedCompetency, SubjectReport,
};
use talent_review::workflows::surveys::{summarize_nps, NpsResponse};

const DEFAULT_WEIGHTS: RoleWeights = RoleWeights::new(20.0, 40.0, 25.0, 15.0);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Override the self/manager divergence threshold.
    #[arg(long, value_parser = parse_threshold)]
    pub(crate) divergence_threshold: Option<f64>,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Rating export with headers cycle_id,subject_id,rater_id,role,competency_id,score,comment
    #[arg(long)]
    pub(crate) ratings_csv: PathBuf,
    /// Employee whose report should be produced
    #[arg(long)]
    pub(crate) subject: String,
    /// Role weights as self,manager,peer,subordinate percentages
    #[arg(long, value_parser = parse_weights)]
    pub(crate) weights: Option<RoleWeights>,
    /// Override the self/manager divergence threshold.
    #[arg(long, value_parser = parse_threshold)]
    pub(crate) divergence_threshold: Option<f64>,
    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn parse_weights(raw: &str) -> Result<RoleWeights, String> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("weights must be numbers ({err})"))?;

    match values.as_slice() {
        [self_review, manager, peer, subordinate] => Ok(RoleWeights::new(
            *self_review,
            *manager,
            *peer,
            *subordinate,
        )),
        _ => Err(format!(
            "expected four comma-separated weights, got {}",
            values.len()
        )),
    }
}

pub(crate) fn parse_threshold(raw: &str) -> Result<f64, String> {
    parse_divergence_threshold(raw).map_err(|err| err.to_string())
}

fn policy(threshold: Option<f64>) -> ConsensusPolicy {
    threshold
        .map(|divergence_threshold| ConsensusPolicy {
            divergence_threshold,
        })
        .unwrap_or_default()
}

/// Rebuild a closed cycle around an exported rating file.
fn cycle_from_export(ratings: &[CompetencyRating], weights: RoleWeights) -> Cycle {
    let today = Local::now().date_naive();
    let cycle_id = ratings
        .first()
        .map(|rating| rating.cycle_id.clone())
        .unwrap_or_else(|| CycleId("imported".to_string()));

    let mut competencies: Vec<ScopedCompetency> = Vec::new();
    for rating in ratings {
        if competencies.iter().all(|scoped| scoped.id != rating.competency_id) {
            competencies.push(ScopedCompetency {
                id: rating.competency_id.clone(),
                name: rating.competency_id.0.clone(),
                required_level: None,
            });
        }
    }

    Cycle {
        name: format!("Imported cycle {cycle_id}"),
        id: cycle_id,
        kind: CycleKind::Annual,
        starts_on: today,
        ends_on: today,
        evaluation_deadline: today,
        weights,
        rating_scale: RatingScale::COMPETENCY,
        status: CycleStatus::Closed,
        competencies,
        activated_at: None,
        closed_at: None,
        archived_at: None,
        revision: 0,
    }
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        ratings_csv,
        subject,
        weights,
        divergence_threshold,
        json,
    } = args;

    let ratings = RatingCsvImporter::from_path(&ratings_csv, RatingScale::COMPETENCY)?;
    let cycle = cycle_from_export(&ratings, weights.unwrap_or(DEFAULT_WEIGHTS));
    let subject = EmployeeId(subject);

    let aggregated = aggregate(&subject, &cycle, &ratings, &cycle.weights)
        .map_err(CycleServiceError::from)?;
    let report = SubjectReport::build(
        &cycle,
        &aggregated,
        &policy(divergence_threshold),
        &[],
        false,
    );

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        println!("{rendered}");
    } else {
        render_report(&report);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let notifier = Arc::new(InMemoryReviewNotifier::default());
    let service = EvaluationCycleService::new(
        Arc::new(InMemoryCycleRepository::default()),
        notifier.clone(),
        policy(args.divergence_threshold),
    );

    println!("Talent review demo ({today})");
    let cycle = service.create_cycle(demo_draft(today))?;
    let subject = EmployeeId("ana".to_string());
    for (employee, participation) in demo_roster(&subject) {
        service.add_participant(&cycle.id, EmployeeId(employee.to_string()), participation)?;
    }
    let cycle = service.transition(&cycle.id, CycleStatus::Active)?;
    println!("Cycle {} is {}", cycle.id, cycle.status);

    for submission in demo_submissions(&subject) {
        let receipt = service.submit_ratings(&cycle.id, submission)?;
        println!(
            "  {} submitted {} ratings (rater complete: {}, subject complete: {})",
            receipt.rater_id,
            receipt.stored.len(),
            receipt.rater_complete,
            receipt.subject_complete
        );
    }

    let progress = service.progress(&cycle.id)?;
    println!(
        "Progress: {}/{} subjects, {}/{} rater assignments",
        progress.evaluated_complete,
        progress.evaluated_total,
        progress.assignments_complete,
        progress.assignments_total
    );

    let cycle = service.transition(&cycle.id, CycleStatus::Closed)?;
    let report = service.subject_report(&cycle.id, &subject)?;
    render_report(&report);

    for competency_id in report.review_competencies() {
        let decision = ReviewDecision {
            final_score: 4.0,
            decided_by: EmployeeId("hr-partner".to_string()),
            decided_at: Utc::now(),
            note: Some("Agreed in calibration session".to_string()),
        };
        let settled = service.decide_review(&cycle.id, &subject, &competency_id, &decision)?;
        println!(
            "Review settled {competency_id} at {:.1} by {}",
            settled.decision.final_score, settled.decision.decided_by
        );
    }
    let report = service.subject_report(&cycle.id, &subject)?;
    println!("Review outstanding after decisions: {}", report.requires_review);
    println!("Alerts queued: {}", notifier.events().len());

    render_calibration(&service, &cycle, &subject)?;
    render_nps()?;
    render_approvals();
    Ok(())
}

fn demo_draft(today: NaiveDate) -> CycleDraft {
    let scoped = |id: &str, name: &str, required_level: Option<f64>| ScopedCompetency {
        id: CompetencyId(id.to_string()),
        name: name.to_string(),
        required_level,
    };

    CycleDraft {
        name: format!("{} annual 360", today.format("%Y")),
        kind: CycleKind::Annual,
        starts_on: today,
        ends_on: today + Duration::days(60),
        evaluation_deadline: today + Duration::days(45),
        weights: DEFAULT_WEIGHTS,
        rating_scale: None,
        competencies: vec![
            scoped("communication", "Communication", Some(4.0)),
            scoped("leadership", "Leadership", Some(5.0)),
            scoped("delivery", "Delivery", None),
        ],
    }
}

fn demo_roster(subject: &EmployeeId) -> Vec<(&'static str, ParticipationRole)> {
    let rater = |role| ParticipationRole::Rater {
        role,
        subject: subject.clone(),
    };
    vec![
        ("ana", ParticipationRole::Evaluated),
        ("bruno", rater(RaterRole::Manager)),
        ("carla", rater(RaterRole::Peer)),
        ("davi", rater(RaterRole::Peer)),
    ]
}

fn demo_submissions(subject: &EmployeeId) -> Vec<RatingSubmission> {
    let submission = |rater: &str, role, scores: [u8; 3]| RatingSubmission {
        subject_id: subject.clone(),
        rater_id: EmployeeId(rater.to_string()),
        role,
        ratings: ["communication", "leadership", "delivery"]
            .into_iter()
            .zip(scores)
            .map(|(competency, score)| RatingEntry {
                competency_id: CompetencyId(competency.to_string()),
                score,
                comment: None,
            })
            .collect(),
    };

    vec![
        submission("ana", RaterRole::SelfReview, [2, 4, 4]),
        submission("bruno", RaterRole::Manager, [5, 3, 4]),
        submission("carla", RaterRole::Peer, [3, 3, 5]),
        submission("davi", RaterRole::Peer, [4, 2, 4]),
    ]
}

fn render_report(report: &SubjectReport) {
    println!(
        "\nReport for {} in {} ({})",
        report.subject_id, report.cycle_id, report.cycle_status
    );
    for row in &report.competencies {
        let buckets: Vec<String> = row
            .buckets
            .iter()
            .map(|bucket| match bucket.average {
                Some(average) => format!("{}={average:.1} (n={})", bucket.role, bucket.rater_count),
                None => format!("{}=missing", bucket.role),
            })
            .collect();
        let composite = row
            .composite
            .map(|value| format!("{value:.1}"))
            .unwrap_or_else(|| "skipped".to_string());
        let consensus = match &row.consensus {
            ConsensusOutcome::Final { score } => format!("final {score:.1}"),
            ConsensusOutcome::RequiresReview { divergence, .. } => {
                format!("review required (divergence {divergence:.1})")
            }
            ConsensusOutcome::ManagerMissing => "manager rating missing".to_string(),
        };
        println!(
            "  {:<16} composite {:<8} {} | {}",
            row.name,
            composite,
            buckets.join(", "),
            consensus
        );
    }

    match report.overall {
        Some(overall) => println!("  Overall: {overall:.1}"),
        None => println!("  Overall: no scored competencies"),
    }
    for gap in &report.gaps {
        println!(
            "  Gap {}: {:.1} -> {:.1} ({:.1}, {})",
            gap.competency_id, gap.current_level, gap.required_level, gap.gap_size, gap.band_label
        );
    }
    if !report.unassessed.is_empty() {
        let ids: Vec<&str> = report.unassessed.iter().map(|id| id.0.as_str()).collect();
        println!("  Unassessed: {}", ids.join(", "));
    }
}

fn render_calibration(
    service: &EvaluationCycleService<InMemoryCycleRepository, InMemoryReviewNotifier>,
    cycle: &Cycle,
    subject: &EmployeeId,
) -> Result<(), AppError> {
    let aggregated = service.aggregated_score(&cycle.id, subject)?;
    let placement = match place(&aggregated, Level::Medium, &PerformanceThresholds::default()) {
        Ok(placement) => placement,
        Err(err) => {
            println!("\nNine-box placement skipped: {err}");
            return Ok(());
        }
    };
    println!(
        "\nNine-box: {} -> box {} {} ({})",
        placement.employee_id, placement.box_number, placement.label, placement.box_key
    );

    let request = MovementRequest {
        employee_id: subject.clone(),
        moved_by: EmployeeId("hr-partner".to_string()),
        from: Some(placement.position),
        to: NineBoxPosition::new(placement.position.performance, Level::High),
        justification: "Potential raised after succession committee review".to_string(),
    };
    match record_movement(cycle, request, Utc::now()) {
        Ok(movement) => println!("  Calibrated to {}", movement.to_box),
        Err(err) => println!("  Calibration skipped: {err}"),
    }
    Ok(())
}

fn render_nps() -> Result<(), AppError> {
    let scores: [(u8, &str); 6] = [
        (10, "ops"),
        (9, "ops"),
        (7, "sales"),
        (6, "sales"),
        (3, "finance"),
        (9, "finance"),
    ];
    let responses: Vec<NpsResponse> = scores
        .iter()
        .enumerate()
        .map(|(index, (score, department))| NpsResponse {
            respondent_id: EmployeeId(format!("respondent-{index}")),
            score: *score,
            department: Some(department.to_string()),
        })
        .collect();

    let summary = summarize_nps(&responses)?;
    println!(
        "\neNPS: {} responses, score {}, average {}",
        summary.responses,
        summary
            .score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        summary
            .average
            .map(|average| format!("{average:.1}"))
            .unwrap_or_else(|| "n/a".to_string())
    );
    Ok(())
}

fn render_approvals() {
    let chain = ApprovalChain {
        leader: EmployeeId("bruno".to_string()),
        specialist: EmployeeId("cs-specialist".to_string()),
        hr_manager: EmployeeId("hr-manager".to_string()),
        director: EmployeeId("director".to_string()),
    };
    let approvers: BTreeMap<ApprovalLevel, EmployeeId> = ApprovalLevel::ordered()
        .into_iter()
        .map(|level| (level, chain.approver_for(level).clone()))
        .collect();

    let mut request = ApprovalRequest::submit(RequestId("jd-analyst".to_string()), chain);
    println!("\nApproval chain for {}", request.id);
    for (level, actor) in approvers {
        let decision = Decision {
            level,
            action: ApprovalAction::Approve,
            actor,
            comment: None,
        };
        match request.decide(decision, Utc::now()) {
            Ok(state) => println!("  level {level}: {state}"),
            Err(err) => {
                println!("  level {level}: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_weights_requires_four_values() {
        assert_eq!(
            parse_weights("20, 40, 25, 15"),
            Ok(RoleWeights::new(20.0, 40.0, 25.0, 15.0))
        );
        assert!(parse_weights("20,40,40").is_err());
        assert!(parse_weights("20,forty,25,15").is_err());
    }

    #[test]
    fn threshold_flag_rejects_negative_and_non_finite_values() {
        assert_eq!(parse_threshold("2.5"), Ok(2.5));
        for raw in ["-1", "NaN", "inf"] {
            let err = parse_threshold(raw).expect_err("threshold rejected");
            assert!(err.contains(raw), "{err}");
        }
    }

    #[test]
    fn export_cycle_keeps_first_seen_competency_order() {
        let csv = "cycle_id,subject_id,rater_id,role,competency_id,score,comment\n\
                   c9,ana,bruno,manager,delivery,4,\n\
                   c9,ana,ana,self,communication,3,\n\
                   c9,ana,carla,peer,delivery,5,\n";
        let ratings = RatingCsvImporter::from_reader(csv.as_bytes(), RatingScale::COMPETENCY)
            .expect("valid export");

        let cycle = cycle_from_export(&ratings, DEFAULT_WEIGHTS);

        assert_eq!(cycle.id, CycleId("c9".to_string()));
        let scope: Vec<&str> = cycle.competency_ids().map(|id| id.0.as_str()).collect();
        assert_eq!(scope, vec!["delivery", "communication"]);
        assert!(cycle.allows_aggregation());
    }

    #[test]
    fn demo_runs_end_to_end() {
        let args = DemoArgs {
            today: NaiveDate::from_ymd_opt(2025, 3, 3),
            divergence_threshold: None,
        };
        run_demo(args).expect("demo completes");
    }
}
