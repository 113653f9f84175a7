use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};
use strata_rs_protocol::{EvalRow, NewMessage, Role, Thread, TraceRow};

/// A millisecond-aligned instant, offset from a fixed base.
pub fn fixed_time(offset_millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + offset_millis)
        .single()
        .unwrap_or_default()
}

pub fn thread_row(id: &str, resource_id: &str) -> Thread {
    Thread {
        id: id.to_string(),
        resource_id: resource_id.to_string(),
        title: Some(format!("thread {id}")),
        metadata: None,
        created_at: fixed_time(0),
        updated_at: fixed_time(0),
    }
}

/// `count` text messages for `thread_id` with ids `<thread_id>-m<n>`, n from 1.
///
/// Roles alternate user/assistant; timestamps are millisecond aligned.
pub fn message_batch(thread_id: &str, count: usize) -> Vec<NewMessage> {
    (1..=count)
        .map(|n| {
            let role = if n % 2 == 1 { Role::User } else { Role::Assistant };
            let mut message = NewMessage::text(thread_id, role, format!("message {n}"));
            message.id = format!("{thread_id}-m{n}");
            message.created_at = fixed_time(n as i64);
            message
        })
        .collect()
}

pub fn eval_row(agent_name: &str, run_id: &str, test_info: Option<Value>) -> EvalRow {
    EvalRow {
        input: "question".to_string(),
        output: "answer".to_string(),
        result: json!({ "score": 1.0 }),
        agent_name: agent_name.to_string(),
        metric_name: "accuracy".to_string(),
        instructions: "be accurate".to_string(),
        test_info,
        global_run_id: "global".to_string(),
        run_id: run_id.to_string(),
        created_at: fixed_time(0),
    }
}

pub fn trace_row(id: &str, name: &str, scope: &str, attributes: Map<String, Value>) -> TraceRow {
    TraceRow {
        id: id.to_string(),
        parent_span_id: None,
        name: name.to_string(),
        trace_id: "trace-1".to_string(),
        scope: scope.to_string(),
        kind: 1,
        attributes: Some(attributes),
        status: None,
        events: None,
        links: None,
        other: None,
        start_time: 0,
        end_time: 1,
        created_at: fixed_time(0),
    }
}
