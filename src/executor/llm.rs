//! llm node execution: prompt build, stream-or-complete consumption, slot
//! extraction.

use tokio_stream::StreamExt;
use tracing::warn;

use crate::{
    client::{LlmClient, LlmReply, LlmResponse, parse_llm_output},
    eval::template,
    executor::StepOutcome,
    model::{LlmPayload, Node},
    session::SessionState,
};

/// Execute an llm node: interpolate the prompt, call the collaborator,
/// write extracted slots and the response text into the session.
pub(crate) async fn run(
    llm: &dyn LlmClient,
    payload: &LlmPayload,
    node: &Node,
    session: &mut SessionState,
) -> StepOutcome {
    let prompt = template::interpolate(&payload.prompt_template, &session.slots);

    let reply = match llm.complete(&prompt).await {
        Ok(LlmResponse::Complete(reply)) => reply,
        Ok(LlmResponse::Stream(stream)) => match collect_stream(stream).await {
            Ok(reply) => reply,
            Err(message) => {
                warn!(node_id = %node.id, error = %message, "llm stream failed");
                return StepOutcome::Failed {
                    message,
                };
            }
        },
        Err(e) => {
            let message = e.to_string();
            warn!(node_id = %node.id, error = %message, "llm call failed");
            return StepOutcome::Failed {
                message,
            };
        }
    };

    session.slots.merge(&reply.extracted_slots);
    if let Some(var) = &payload.output_var {
        session.slots.set(var, reply.response_text.clone());
    }
    session.push_bot_message(reply.response_text, Some(node.id.clone()));

    StepOutcome::Advance {
        handle: None,
    }
}

/// Drain an incremental completion into a full reply. The concatenated text
/// goes through the same slot-separator parse as a one-shot result.
async fn collect_stream(mut stream: crate::client::LlmStream) -> Result<LlmReply, String> {
    let mut buffer = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => buffer.push_str(&text),
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(parse_llm_output(&buffer))
}
