//! Dependency-graph validation over a set of [`Job`] prereq names.

use std::collections::{HashMap, HashSet};

use crate::error::SchedulerError;

use super::job::Job;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Verify every `prereq` names a Job in the set and that the prereq graph
/// has no cycle. Grounded on the original's `TestHarness.__checkDependencies`
/// (a DAG is required before any job can be dispatched).
pub fn check(jobs: &[Job]) -> Result<(), SchedulerError> {
    let names: HashSet<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    for job in jobs {
        for prereq in &job.prereqs {
            if !names.contains(prereq.as_str()) {
                return Err(SchedulerError::PrereqCycle(vec![
                    job.name.clone(),
                    format!("unknown prereq '{prereq}'"),
                ]));
            }
        }
    }

    let by_name: HashMap<&str, &Job> = jobs.iter().map(|j| (j.name.as_str(), j)).collect();
    let mut color: HashMap<&str, Color> = jobs.iter().map(|j| (j.name.as_str(), Color::White)).collect();

    for job in jobs {
        if color[job.name.as_str()] == Color::White {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(job.name.as_str(), &by_name, &mut color, &mut stack) {
                return Err(SchedulerError::PrereqCycle(cycle));
            }
        }
    }
    Ok(())
}

fn visit<'a>(
    name: &'a str,
    by_name: &HashMap<&'a str, &'a Job>,
    color: &mut HashMap<&'a str, Color>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    color.insert(name, Color::Gray);
    stack.push(name);

    let job = by_name[name];
    for prereq in &job.prereqs {
        let prereq = prereq.as_str();
        match color.get(prereq).copied().unwrap_or(Color::White) {
            Color::White => {
                if let Some(cycle) = visit(prereq, by_name, color, stack) {
                    return Some(cycle);
                }
            }
            Color::Gray => {
                let start = stack.iter().position(|&n| n == prereq).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(prereq.to_string());
                return Some(cycle);
            }
            Color::Black => {}
        }
    }

    stack.pop();
    color.insert(name, Color::Black);
    None
}
