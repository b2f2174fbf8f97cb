use std::sync::Arc;
use std::time::Duration;

use echolab_agent::few_shot::parse_examples;
use echolab_agent::{CandidateExtractor, OpenAiCompatibleClient};
use echolab_core::domain::message::UnparsedMessage;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const EXAMPLES: &str = r#"[
    {"text": "Hello, I am Ada Lovelace, a PhD student at Cambridge working with Babbage.",
     "name": "Ada Lovelace", "graduate_institution": "Cambridge", "advisor": "Charles Babbage",
     "email": null, "quality_assessment": 9, "overall_summary": "Strong applicant."}
]"#;

fn tool_reply(arguments: Value) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_live",
                    "type": "function",
                    "function": {"name": "Data", "arguments": arguments.to_string()}
                }]
            }
        }]
    })
}

#[tokio::test]
async fn extractor_sends_few_shot_prompt_and_reads_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_reply(json!({
            "people": [{"name": "Grace Hopper", "graduate_institution": "Yale",
                        "quality_assessment": "8", "email": "grace@example.edu"}]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(server.uri(), "llama2", None, Duration::from_secs(5))
        .expect("client")
        .with_retry_delay(Duration::ZERO);
    let extractor =
        CandidateExtractor::new(Arc::new(client), parse_examples(EXAMPLES).expect("examples"));

    let report = extractor
        .parse_unparsed(&[UnparsedMessage {
            text: "Grace Hopper, Yale PhD, grace@example.edu".to_owned(),
            channel_id: "C042".to_owned(),
            ts: 1_700_000_000,
        }])
        .await;

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failure_lines());
    let parsed = &report.succeeded[0];
    assert_eq!(parsed.candidate.name.as_deref(), Some("Grace Hopper"));
    assert_eq!(parsed.candidate.quality_assessment.map(|q| q.value()), Some(8));
    assert_eq!(parsed.ts, 1_700_000_000);

    let requests: Vec<Request> = server.received_requests().await.expect("recorded requests");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("request body");
    let roles: Vec<_> =
        body["messages"].as_array().expect("messages").iter().map(|m| m["role"].clone()).collect();
    assert_eq!(roles, vec![json!("system"), json!("user"), json!("assistant"), json!("tool"), json!("user")]);
    assert_eq!(body["model"], json!("llama2"));
    assert_eq!(body["messages"][2]["tool_calls"][0]["id"], json!("call_example_0"));
    assert_eq!(body["tool_choice"]["function"]["name"], json!("Data"));
}

#[tokio::test]
async fn model_outage_leaves_message_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(server.uri(), "llama2", None, Duration::from_secs(5))
        .expect("client")
        .with_max_retries(1)
        .with_retry_delay(Duration::ZERO);
    let extractor = CandidateExtractor::new(Arc::new(client), Vec::new());

    let report = extractor
        .parse_unparsed(&[UnparsedMessage {
            text: "someone".to_owned(),
            channel_id: "C1".to_owned(),
            ts: 5,
        }])
        .await;

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].detail.contains("503"));
}
