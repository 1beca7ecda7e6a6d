//! Assertion helpers for live-update dispatch scenarios.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{DispatchResult, LiveUpdateState};

fn result(live_update_state: &LiveUpdateState) -> StepResult<DispatchResult> {
    live_update_state
        .result
        .get()
        .ok_or_else(|| String::from("dispatch result should be set"))
}

fn remote_commands(live_update_state: &LiveUpdateState) -> StepResult<Vec<String>> {
    live_update_state
        .cluster
        .get()
        .map(|cluster| cluster.commands())
        .ok_or_else(|| String::from("cluster should be set"))
}

fn deploy_events(live_update_state: &LiveUpdateState) -> StepResult<Vec<String>> {
    live_update_state
        .deployer
        .get()
        .map(|deployer| deployer.events())
        .ok_or_else(|| String::from("deployer should be set"))
}

#[then("the target is built by {expected}")]
fn built_by(live_update_state: &LiveUpdateState, expected: String) -> StepResult<()> {
    match result(live_update_state)? {
        DispatchResult::Built { strategy } if strategy == expected => Ok(()),
        other => Err(format!("expected a build by {expected}, got {other:?}")),
    }
}

#[then("dispatch fails in {expected}")]
fn fails_in(live_update_state: &LiveUpdateState, expected: String) -> StepResult<()> {
    match result(live_update_state)? {
        DispatchResult::Failed { strategy } if strategy == expected => Ok(()),
        other => Err(format!("expected {expected} to fail, got {other:?}")),
    }
}

#[then("dispatch finds no eligible strategy after {expected}")]
fn no_eligible_strategy(live_update_state: &LiveUpdateState, expected: String) -> StepResult<()> {
    match result(live_update_state)? {
        DispatchResult::NoEligibleStrategy { tried } if tried.join(", ") == expected => Ok(()),
        other => Err(format!("expected no eligible strategy after {expected}, got {other:?}")),
    }
}

#[then("the remote commands are {expected}")]
fn remote_commands_are(live_update_state: &LiveUpdateState, expected: String) -> StepResult<()> {
    let commands = remote_commands(live_update_state)?;
    let wanted: Vec<&str> = expected.split("; ").collect();
    if commands == wanted {
        Ok(())
    } else {
        Err(format!("expected remote commands {wanted:?}, got {commands:?}"))
    }
}

#[then("no remote commands ran")]
fn no_remote_commands(live_update_state: &LiveUpdateState) -> StepResult<()> {
    let commands = remote_commands(live_update_state)?;
    if commands.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no remote commands, got {commands:?}"))
    }
}

#[then("no image was built")]
fn no_image_built(live_update_state: &LiveUpdateState) -> StepResult<()> {
    let events = deploy_events(live_update_state)?;
    if events.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no image build, got {events:?}"))
    }
}

#[then("the image was built and applied")]
fn image_built_and_applied(live_update_state: &LiveUpdateState) -> StepResult<()> {
    let events = deploy_events(live_update_state)?;
    if events == ["build web", "apply web-deployment web:v2"] {
        Ok(())
    } else {
        Err(format!("expected a build then an apply, got {events:?}"))
    }
}
