//! api node execution: templated request build, fan-out and response mapping.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    Result,
    client::HttpFetch,
    common::Slots,
    eval::{path::SlotPath, template},
    executor::StepOutcome,
    model::{ApiCall, ApiPayload, HANDLE_ON_SUCCESS},
};

/// Slot that carries the failure message of the last failed api node.
pub const SLOT_API_ERROR: &str = "apiError";
/// Slot flagging that the last api node failed.
pub const SLOT_API_FAILED: &str = "apiFailed";

/// Execute an api node. Multi-call mode fans out concurrently and settles
/// every sub-request before the node's outcome is decided; a single
/// rejection fails the whole node.
pub(crate) async fn run(
    http: &dyn HttpFetch,
    payload: &ApiPayload,
    slots: &mut Slots,
) -> StepOutcome {
    let calls: Vec<&ApiCall> = if payload.is_multi && !payload.apis.is_empty() {
        payload.apis.iter().collect()
    } else {
        vec![&payload.call]
    };

    let snapshot = slots.clone();
    let results = join_all(calls.iter().map(|call| execute_call(http, call, &snapshot))).await;

    if let Some(message) = results.iter().find_map(|r| r.as_ref().err().map(|e| e.to_string())) {
        warn!(error = %message, "api node failed");
        slots.set(SLOT_API_ERROR, message.clone());
        slots.set(SLOT_API_FAILED, true);
        return StepOutcome::Failed {
            message,
        };
    }

    for (call, result) in calls.iter().zip(results) {
        // errors were handled above
        let Ok(response) = result else { continue };
        apply_response_mapping(call, &response, slots);
    }

    StepOutcome::Advance {
        handle: Some(HANDLE_ON_SUCCESS.to_string()),
    }
}

async fn execute_call(
    http: &dyn HttpFetch,
    call: &ApiCall,
    slots: &Slots,
) -> Result<Value> {
    let url = template::interpolate(&call.url, slots);
    let headers = call.headers.iter().map(|(k, v)| (k.clone(), template::interpolate(v, slots))).collect();
    let query: Vec<(String, String)> = call.params.iter().map(|(k, v)| (k.clone(), template::interpolate(v, slots))).collect();
    let body = call.body.as_ref().map(|b| template::resolve_json_value(b, slots));

    debug!(method = %call.method, url = %url, "api call");
    http.fetch(&call.method, &url, &headers, &query, body.as_ref()).await
}

fn apply_response_mapping(
    call: &ApiCall,
    response: &Value,
    slots: &mut Slots,
) {
    for mapping in &call.response_mapping {
        let resolved = SlotPath::parse(&mapping.path).and_then(|p| p.resolve(response));
        match resolved {
            Some(value) => slots.set(&mapping.slot, value.clone()),
            // an unresolvable path leaves the slot untouched
            None => debug!(path = %mapping.path, slot = %mapping.slot, "response path did not resolve"),
        }
    }
}
