//! Assertion helpers for update-mode behavioural tests.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{Resolution, UpdateModeState};

fn resolution(update_mode_state: &UpdateModeState) -> StepResult<Resolution> {
    update_mode_state
        .resolution
        .get()
        .ok_or_else(|| String::from("resolution should be set"))
}

#[then("the resolved mode is {expected}")]
fn resolved_mode_is(update_mode_state: &UpdateModeState, expected: String) -> StepResult<()> {
    match resolution(update_mode_state)? {
        Resolution::Resolved(mode) if mode.to_string() == expected => Ok(()),
        Resolution::Resolved(mode) => Err(format!("expected {expected}, got {mode}")),
        other => Err(format!("expected {expected}, got {other:?}")),
    }
}

#[then("resolution fails for the {mode} mode")]
fn resolution_fails_for(update_mode_state: &UpdateModeState, mode: String) -> StepResult<()> {
    match resolution(update_mode_state)? {
        Resolution::Unsatisfiable { requested } if requested == mode => Ok(()),
        other => Err(format!("expected '{mode}' to be unsatisfiable, got {other:?}")),
    }
}
