//! Output-shape hints passed to the model alongside each prompt.

use serde_json::{Value, json};

fn string_list() -> Value {
    json!({"type": "ARRAY", "items": {"type": "STRING"}})
}

pub fn algorithm_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {"type": "STRING"},
            "inspiration": {"type": "STRING"},
            "domain": {"type": "STRING"},
            "description": {"type": "STRING"},
            "principle": {"type": "STRING"},
            "steps": string_list(),
            "applications": string_list(),
            "pseudoCode": {"type": "STRING"},
            "tags": string_list(),
        },
        "required": ["name", "description", "principle", "steps", "pseudoCode"],
    })
}

pub fn problem_seeds_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {"type": "STRING"},
                "description": {"type": "STRING"},
                "domain": {"type": "STRING"},
            },
            "required": ["title", "description", "domain"],
        },
    })
}

pub fn sanity_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "verdict": {"type": "STRING"},
            "score": {"type": "NUMBER"},
            "issues": string_list(),
            "strengths": string_list(),
            "summary": {"type": "STRING"},
        },
        "required": ["verdict", "summary"],
    })
}

pub fn blind_spot_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "risks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "risk": {"type": "STRING"},
                        "severity": {"type": "STRING", "enum": ["Low", "Medium", "High"]},
                        "mitigation": {"type": "STRING"},
                    },
                    "required": ["risk", "severity"],
                },
            },
            "summary": {"type": "STRING"},
        },
        "required": ["risks"],
    })
}

pub fn extension_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "extensions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {"type": "STRING"},
                        "description": {"type": "STRING"},
                        "addresses": {"type": "STRING"},
                    },
                    "required": ["title", "description"],
                },
            },
            "summary": {"type": "STRING"},
        },
        "required": ["extensions"],
    })
}
