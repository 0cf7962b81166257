use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use serde_json::{Map, Value};
use tracing::debug;

use demoqa_e2e::api::values::{display_value, get_by_path, rows_hash_coerced};
use demoqa_e2e::config::normalize_base;
use demoqa_e2e::error::assertion;
use demoqa_e2e::{ApiResponse, E2eResult, FailurePolicy};

use crate::world::{table_rows, DemoWorld};

fn keep(world: &mut DemoWorld, response: ApiResponse) {
    debug!(
        "Object API answered {} (mocked: {}): {}",
        response.status, response.mocked, response.body
    );
    world.last_response = Some(response);
}

#[given(regex = r#"^the API base url is "([^"]*)"$"#)]
async fn api_base_url(world: &mut DemoWorld, url: String) -> E2eResult<()> {
    world.api_base = Some(normalize_base(&url)?);
    Ok(())
}

async fn create(world: &mut DemoWorld, name: &str, data: Map<String, Value>) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let response = suite.api().create(&base, name, data).await?;
    keep(world, response);
    Ok(())
}

#[when(regex = r#"^I create an object named "([^"]*)" with data:$"#)]
async fn create_with_data(world: &mut DemoWorld, name: String, step: &Step) -> E2eResult<()> {
    let data = rows_hash_coerced(table_rows(step)?);
    create(world, &name, data).await
}

#[when(regex = r#"^I create an object named "([^"]*)"$"#)]
async fn create_bare(world: &mut DemoWorld, name: String) -> E2eResult<()> {
    create(world, &name, Map::new()).await
}

async fn get(world: &mut DemoWorld, id: &str, policy: FailurePolicy) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let id = world.resolve(id)?;
    let response = suite.api().get(&base, &id, policy).await?;
    keep(world, response);
    Ok(())
}

#[when(regex = r#"^I get the object "([^"]*)"$"#)]
async fn get_object(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    get(world, &id, FailurePolicy::Strict).await
}

#[when(regex = r#"^I get the object "([^"]*)" \(allowing failure\)$"#)]
async fn get_object_lenient(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    get(world, &id, FailurePolicy::Lenient).await
}

async fn rename(world: &mut DemoWorld, id: &str, name: &str, policy: FailurePolicy) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let id = world.resolve(id)?;
    let response = suite.api().update_name(&base, &id, name, policy).await?;
    keep(world, response);
    Ok(())
}

#[when(regex = r#"^I rename the object "([^"]*)" to "([^"]*)"$"#)]
async fn rename_object(world: &mut DemoWorld, id: String, name: String) -> E2eResult<()> {
    rename(world, &id, &name, FailurePolicy::Strict).await
}

#[when(regex = r#"^I rename the object "([^"]*)" to "([^"]*)" \(allowing failure\)$"#)]
async fn rename_object_lenient(world: &mut DemoWorld, id: String, name: String) -> E2eResult<()> {
    rename(world, &id, &name, FailurePolicy::Lenient).await
}

#[when(regex = r#"^I patch the object "([^"]*)" with data:$"#)]
async fn patch_object(world: &mut DemoWorld, id: String, step: &Step) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let id = world.resolve(&id)?;
    let delta = rows_hash_coerced(table_rows(step)?);
    let response = suite
        .api()
        .patch(&base, &id, delta, FailurePolicy::Strict)
        .await?;
    keep(world, response);
    Ok(())
}

async fn delete(world: &mut DemoWorld, id: &str, policy: FailurePolicy) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let id = world.resolve(id)?;
    let response = suite.api().delete(&base, &id, policy).await?;
    keep(world, response);
    Ok(())
}

#[when(regex = r#"^I delete the object "([^"]*)"$"#)]
async fn delete_object(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    delete(world, &id, FailurePolicy::Strict).await
}

#[when(regex = r#"^I delete the object "([^"]*)" \(allowing failure\)$"#)]
async fn delete_object_lenient(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    delete(world, &id, FailurePolicy::Lenient).await
}

#[when("I list all objects")]
async fn list_objects(world: &mut DemoWorld) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let response = suite.api().list(&base).await?;
    keep(world, response);
    Ok(())
}

#[when(regex = r#"^I get the seeded object "([^"]*)"$"#)]
async fn get_seeded(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    let suite = world.suite()?;
    let base = world.api_base()?;
    let response = suite.api().get_mock(&base, &id).await?;
    keep(world, response);
    Ok(())
}

#[then(regex = r"^the response status should be (\d+)$")]
async fn status_is(world: &mut DemoWorld, expected: u16) -> E2eResult<()> {
    let status = world.response()?.status;
    if status != expected {
        return Err(assertion(format!("status {status}, expected {expected}")));
    }
    Ok(())
}

#[then(regex = r"^the response status should be one of ([\d, ]+)$")]
async fn status_in(world: &mut DemoWorld, allowed: String) -> E2eResult<()> {
    let allowed: Vec<u16> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let status = world.response()?.status;
    if !allowed.contains(&status) {
        return Err(assertion(format!("status {status}, expected one of {allowed:?}")));
    }
    Ok(())
}

fn field<'r>(response: &'r ApiResponse, path: &str) -> E2eResult<&'r Value> {
    get_by_path(&response.body, path)
        .ok_or_else(|| assertion(format!("response has no field \"{path}\": {}", response.body)))
}

#[then(regex = r#"^I save the response field "([^"]*)" as "([^"]*)"$"#)]
async fn save_field(world: &mut DemoWorld, path: String, alias: String) -> E2eResult<()> {
    let value = display_value(field(world.response()?, &path)?);
    world.remember(&alias, value);
    Ok(())
}

#[then(regex = r#"^the response field "([^"]*)" should equal "([^"]*)"$"#)]
async fn field_equals(world: &mut DemoWorld, path: String, expected: String) -> E2eResult<()> {
    let expected = world.resolve(&expected)?;
    let actual = display_value(field(world.response()?, &path)?);
    if actual != expected {
        return Err(assertion(format!("\"{path}\" is \"{actual}\", expected \"{expected}\"")));
    }
    Ok(())
}

#[then(regex = r#"^the response field "([^"]*)" should exist$"#)]
async fn field_exists(world: &mut DemoWorld, path: String) -> E2eResult<()> {
    field(world.response()?, &path)?;
    Ok(())
}

#[then("the response body should be a non-empty array")]
async fn non_empty_array(world: &mut DemoWorld) -> E2eResult<()> {
    match world.response()?.body.as_array() {
        Some(items) if !items.is_empty() => Ok(()),
        _ => Err(assertion(format!("expected a non-empty array, got {}", world.response()?.body))),
    }
}

#[then(regex = r#"^the list should not include the object "([^"]*)"$"#)]
async fn list_excludes(world: &mut DemoWorld, id: String) -> E2eResult<()> {
    let id = world.resolve(&id)?;
    let listed = world
        .response()?
        .body
        .as_array()
        .map(|items| items.iter().any(|o| o.get("id").and_then(Value::as_str) == Some(id.as_str())))
        .unwrap_or(false);
    if listed {
        return Err(assertion(format!("object {id} is still listed")));
    }
    Ok(())
}

#[then(regex = r#"^the response header "([^"]*)" should contain "([^"]*)"$"#)]
async fn header_contains(world: &mut DemoWorld, name: String, expected: String) -> E2eResult<()> {
    let response = world.response()?;
    match response.header(&name) {
        Some(value) if value.contains(&expected) => Ok(()),
        other => Err(assertion(format!("header \"{name}\" is {other:?}, expected it to contain \"{expected}\""))),
    }
}

#[then(regex = r"^the response time should be below (\d+) ms$")]
async fn response_time_below(world: &mut DemoWorld, limit: u64) -> E2eResult<()> {
    // Synthesized responses have no round trip
    let elapsed = world.response()?.duration_ms.unwrap_or(0);
    if elapsed >= limit {
        return Err(assertion(format!("response took {elapsed} ms, limit {limit} ms")));
    }
    Ok(())
}
