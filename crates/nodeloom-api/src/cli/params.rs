//! JSON arguments given inline or as `@path`.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

/// Read a JSON argument: `@file.json` loads the file, anything else is parsed
/// as inline JSON.
pub async fn read_json_arg(raw: &str) -> Result<Value> {
    let (text, origin) = match raw.strip_prefix('@') {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {path}"))?;
            (text, path.to_string())
        }
        None => (raw.to_string(), "inline argument".to_string()),
    };
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {origin}"))
}

/// Skill parameters: an object, `{}` when absent.
pub async fn read_params(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match read_json_arg(raw).await? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("skill parameters must be a JSON object, got {other}"),
    }
}

/// A command list, given either as an array or as `{"commands": [...]}`.
pub async fn read_commands(raw: &str) -> Result<Vec<Value>> {
    match read_json_arg(raw).await? {
        Value::Array(commands) => Ok(commands),
        Value::Object(mut map) => match map.remove("commands") {
            Some(Value::Array(commands)) => Ok(commands),
            _ => bail!("expected a JSON array of commands or an object with a `commands` array"),
        },
        _ => bail!("expected a JSON array of commands"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn inline_and_file_params() {
        assert_eq!(read_params(None).await.unwrap(), Map::new());
        let inline = read_params(Some(r#"{"spacing": 40}"#)).await.unwrap();
        assert_eq!(inline["spacing"], 40);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        tokio::fs::write(&path, r#"{"direction": "vertical"}"#).await.unwrap();
        let from_file = read_params(Some(&format!("@{}", path.display()))).await.unwrap();
        assert_eq!(from_file["direction"], "vertical");
    }

    #[tokio::test]
    async fn non_object_params_are_rejected() {
        let err = read_params(Some("[1, 2]")).await.unwrap_err();
        assert!(err.to_string().contains("JSON object"));
        assert!(read_params(Some("{nope")).await.is_err());
    }

    #[tokio::test]
    async fn commands_accept_both_shapes() {
        let bare = read_commands(r#"[{"type": "deleteNode", "id": "a"}]"#).await.unwrap();
        let wrapped = read_commands(r#"{"commands": [{"type": "deleteNode", "id": "a"}]}"#)
            .await
            .unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0], json!({ "type": "deleteNode", "id": "a" }));
    }
}
