use crate::few_shot::FewShotExample;
use crate::llm::{ChatRequest, ChatTurn, ToolCall};
use crate::schema::{data_tool, DATA_FUNCTION};

pub const SYSTEM_INSTRUCTION: &str = "You are an expert email extraction algorithm and an HR \
manager who wants to pick the best candidates for a new position. Only extract relevant \
information from the text. If you do not know the value of an attribute asked to extract, \
return null for the attribute's value.";

pub const TOOL_CONFIRMATION: &str = "You have correctly called this tool.";

/// System instruction, then a user/assistant/tool triple per example, then the
/// real text as the last user turn.
pub fn build_messages(text: &str, examples: &[FewShotExample]) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(2 + examples.len() * 3);
    messages.push(ChatTurn::system(SYSTEM_INSTRUCTION));

    for (index, example) in examples.iter().enumerate() {
        let call_id = format!("call_example_{index}");
        let arguments = serde_json::json!({ "people": [example.candidate] }).to_string();

        messages.push(ChatTurn::user(example.text.clone()));
        messages.push(ChatTurn::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall::function(call_id.clone(), DATA_FUNCTION, arguments)],
        });
        messages.push(ChatTurn::Tool {
            content: TOOL_CONFIRMATION.to_owned(),
            tool_call_id: call_id,
        });
    }

    messages.push(ChatTurn::user(text));
    messages
}

/// Temperature 0 with the `Data` function forced.
pub fn extraction_request(text: &str, examples: &[FewShotExample]) -> ChatRequest {
    let tool = data_tool();
    ChatRequest {
        messages: build_messages(text, examples),
        temperature: 0.0,
        tool_choice: Some(tool.forced_choice()),
        tools: vec![tool],
    }
}
