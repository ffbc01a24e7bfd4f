//! Output contracts for each phase
//!
//! A response that deserializes is not yet trusted: bounded scores must be in
//! range and every cross-reference must resolve. Any violation fails the
//! phase.

use std::collections::{HashMap, HashSet};

use crate::types::{
    AgentForecast, AnalysisResult, DiscoveryResult, HypothesisSet, TargetedAnalysis,
    PRIORITY_SCORE_MAX, SATISFACTION_MAX, SATISFACTION_MIN,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfBounds {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} references unknown id '{id}'")]
    UnknownReference { field: String, id: String },
    #[error("duplicate {field} '{id}'")]
    DuplicateId { field: String, id: String },
    #[error("hypothesis '{id}' depends on itself")]
    SelfDependency { id: String },
    #[error("dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },
    #[error("{field} has no entry for '{id}'")]
    MissingCoverage { field: String, id: String },
    #[error("{field} must not be empty")]
    EmptyField { field: String },
}

/// `value` must lie in `[min, max]`; NaN never does
pub fn check_bounded(field: &str, value: f64, min: f64, max: f64) -> Result<(), ContractViolation> {
    if value.is_nan() || value < min || value > max {
        return Err(ContractViolation::OutOfBounds {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_unit(field: &str, value: f64) -> Result<(), ContractViolation> {
    check_bounded(field, value, 0.0, 1.0)
}

fn check_not_empty(field: &str, value: &str) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn check_known(field: &str, id: &str, known: &HashSet<&str>) -> Result<(), ContractViolation> {
    if !known.contains(id) {
        return Err(ContractViolation::UnknownReference {
            field: field.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Collect IDs, rejecting blanks and duplicates
fn unique_ids<'a>(
    field: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ContractViolation> {
    let mut seen = HashSet::new();
    for id in ids {
        check_not_empty(field, id)?;
        if !seen.insert(id) {
            return Err(ContractViolation::DuplicateId {
                field: field.to_string(),
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

/// Discovery output.
///
/// With `sample_ids`, every example or affected ticket ID must come from the
/// tickets that were actually sent.
pub fn validate_discovery(
    result: &DiscoveryResult,
    sample_ids: Option<&HashSet<&str>>,
) -> Result<(), ContractViolation> {
    check_unit("data_quality_score", result.data_quality_score)?;
    check_unit("confidence_score", result.confidence_score)?;

    for (d, dimension) in result.dimensions.iter().enumerate() {
        check_not_empty(&format!("dimensions[{d}].dimension"), &dimension.dimension)?;
        for (b, bucket) in dimension.buckets.iter().enumerate() {
            check_unit(&format!("dimensions[{d}].buckets[{b}].share"), bucket.share)?;
        }
    }

    unique_ids("pattern id", result.patterns.iter().map(|p| p.id.as_str()))?;
    for (i, pattern) in result.patterns.iter().enumerate() {
        check_unit(&format!("patterns[{i}].confidence"), pattern.confidence)?;
        check_not_empty(&format!("patterns[{i}].description"), &pattern.description)?;
        if let Some(sample) = sample_ids {
            for id in &pattern.example_ticket_ids {
                check_known(&format!("patterns[{i}].example_ticket_ids"), id, sample)?;
            }
        }
    }

    for (i, anomaly) in result.anomalies.iter().enumerate() {
        check_unit(&format!("anomalies[{i}].confidence"), anomaly.confidence)?;
        if let Some(sample) = sample_ids {
            for id in &anomaly.affected_ticket_ids {
                check_known(&format!("anomalies[{i}].affected_ticket_ids"), id, sample)?;
            }
        }
    }

    Ok(())
}

/// Hypothesis set, internally consistent and, with `pattern_ids`, grounded in
/// discovery patterns.
pub fn validate_hypotheses(
    set: &HypothesisSet,
    pattern_ids: Option<&HashSet<&str>>,
) -> Result<(), ContractViolation> {
    check_unit("confidence_score", set.confidence_score)?;

    let known = unique_ids("hypothesis id", set.ids())?;

    for (i, hypothesis) in set.hypotheses.iter().enumerate() {
        check_unit(&format!("hypotheses[{i}].confidence"), hypothesis.confidence)?;
        check_not_empty(&format!("hypotheses[{i}].statement"), &hypothesis.statement)?;
        check_not_empty(&format!("hypotheses[{i}].test_strategy"), &hypothesis.test_strategy)?;
        for dep in &hypothesis.dependencies {
            if *dep == hypothesis.id {
                return Err(ContractViolation::SelfDependency {
                    id: hypothesis.id.clone(),
                });
            }
            check_known(&format!("hypotheses[{i}].dependencies"), dep, &known)?;
        }
        if let Some(patterns) = pattern_ids {
            for id in &hypothesis.source_pattern_ids {
                check_known(&format!("hypotheses[{i}].source_pattern_ids"), id, patterns)?;
            }
        }
    }

    let mut scored = HashSet::new();
    for (i, score) in set.priority_matrix.iter().enumerate() {
        check_known("priority_matrix.hypothesis_id", &score.hypothesis_id, &known)?;
        if !scored.insert(score.hypothesis_id.as_str()) {
            return Err(ContractViolation::DuplicateId {
                field: "priority_matrix.hypothesis_id".to_string(),
                id: score.hypothesis_id.clone(),
            });
        }
        check_bounded(&format!("priority_matrix[{i}].impact"), score.impact, 0.0, PRIORITY_SCORE_MAX)?;
        check_bounded(&format!("priority_matrix[{i}].effort"), score.effort, 0.0, PRIORITY_SCORE_MAX)?;
        check_bounded(&format!("priority_matrix[{i}].risk"), score.risk, 0.0, PRIORITY_SCORE_MAX)?;
    }

    let plan = &set.investigation_plan;
    if !set.hypotheses.is_empty() && plan.phases.is_empty() {
        return Err(ContractViolation::EmptyField {
            field: "investigation_plan.phases".to_string(),
        });
    }
    for (p, phase) in plan.phases.iter().enumerate() {
        if phase.order == 0 {
            return Err(ContractViolation::OutOfBounds {
                field: format!("investigation_plan.phases[{p}].order"),
                value: 0.0,
                min: 1.0,
                max: f64::from(u32::MAX),
            });
        }
        for id in &phase.hypotheses {
            check_known(&format!("investigation_plan.phases[{p}].hypotheses"), id, &known)?;
        }
    }
    for dependency in &plan.dependencies {
        check_known(
            "investigation_plan.dependencies.hypothesis_id",
            &dependency.hypothesis_id,
            &known,
        )?;
        for dep in &dependency.depends_on {
            if *dep == dependency.hypothesis_id {
                return Err(ContractViolation::SelfDependency { id: dep.clone() });
            }
            check_known("investigation_plan.dependencies.depends_on", dep, &known)?;
        }
    }

    check_acyclic(set)
}

/// Hypothesis and plan dependencies together must form a DAG
fn check_acyclic(set: &HypothesisSet) -> Result<(), ContractViolation> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for hypothesis in &set.hypotheses {
        edges
            .entry(hypothesis.id.as_str())
            .or_default()
            .extend(hypothesis.dependencies.iter().map(String::as_str));
    }
    for dependency in &set.investigation_plan.dependencies {
        edges
            .entry(dependency.hypothesis_id.as_str())
            .or_default()
            .extend(dependency.depends_on.iter().map(String::as_str));
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), ContractViolation> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                path.push(node.to_string());
                return Err(ContractViolation::DependencyCycle { path });
            }
            None => {}
        }

        marks.insert(node, Mark::Visiting);
        stack.push(node);
        if let Some(next) = edges.get(node) {
            for &dep in next {
                visit(dep, edges, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    // Walk in declaration order so the reported path is deterministic
    for hypothesis in &set.hypotheses {
        visit(hypothesis.id.as_str(), &edges, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Targeted analysis against the hypothesis set it was asked about
pub fn validate_targeted(
    analysis: &TargetedAnalysis,
    hypotheses: &HypothesisSet,
) -> Result<(), ContractViolation> {
    let known: HashSet<&str> = hypotheses.ids().collect();
    for result in &analysis.results {
        check_known("results.hypothesis_id", &result.hypothesis_id, &known)?;
    }

    let covered = check_targeted_results(analysis)?;
    for hypothesis in &hypotheses.hypotheses {
        if !covered.contains(hypothesis.id.as_str()) {
            return Err(ContractViolation::MissingCoverage {
                field: "results".to_string(),
                id: hypothesis.id.clone(),
            });
        }
    }

    Ok(())
}

/// Scores in range and at most one result per hypothesis. Returns the covered IDs.
fn check_targeted_results(
    analysis: &TargetedAnalysis,
) -> Result<HashSet<&str>, ContractViolation> {
    check_unit("confidence_score", analysis.confidence_score)?;

    let mut covered = HashSet::new();
    for (i, result) in analysis.results.iter().enumerate() {
        check_not_empty("results.hypothesis_id", &result.hypothesis_id)?;
        if !covered.insert(result.hypothesis_id.as_str()) {
            return Err(ContractViolation::DuplicateId {
                field: "results.hypothesis_id".to_string(),
                id: result.hypothesis_id.clone(),
            });
        }
        check_unit(&format!("results[{i}].confidence"), result.confidence)?;
        for (f, finding) in result.findings.iter().enumerate() {
            check_unit(&format!("results[{i}].findings[{f}].confidence"), finding.confidence)?;
        }
        for (m, metric) in result.metrics.iter().enumerate() {
            if !metric.value.is_finite() {
                return Err(ContractViolation::OutOfBounds {
                    field: format!("results[{i}].metrics[{m}].value"),
                    value: metric.value,
                    min: f64::MIN,
                    max: f64::MAX,
                });
            }
        }
    }
    Ok(covered)
}

pub fn validate_forecast(forecast: &AgentForecast) -> Result<(), ContractViolation> {
    check_bounded(
        "predicted_resolution_hours",
        forecast.predicted_resolution_hours,
        0.0,
        f64::MAX,
    )?;
    check_bounded(
        "predicted_satisfaction",
        forecast.predicted_satisfaction,
        SATISFACTION_MIN,
        SATISFACTION_MAX,
    )?;
    check_unit("burnout_risk", forecast.burnout_risk)?;
    check_unit("confidence_score", forecast.confidence_score)
}

/// Checks that need no upstream context, for payloads read back from the
/// result cache
pub fn validate_stored(result: &AnalysisResult) -> Result<(), ContractViolation> {
    match result {
        AnalysisResult::Discovery(discovery) => {
            if discovery.sampled_tickets > discovery.total_tickets {
                return Err(ContractViolation::OutOfBounds {
                    field: "sampled_tickets".to_string(),
                    value: discovery.sampled_tickets as f64,
                    min: 0.0,
                    max: discovery.total_tickets as f64,
                });
            }
            validate_discovery(discovery, None)
        }
        AnalysisResult::Hypothesis(set) => validate_hypotheses(set, None),
        AnalysisResult::TargetedAnalysis(analysis) => check_targeted_results(analysis).map(|_| ()),
        AnalysisResult::AgentForecast(forecast) => validate_forecast(forecast),
    }
}
