//! Definition catalogue loading from YAML.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nodeloom_types::catalog::{DefinitionCatalog, NodeDefinition};
use serde::Deserialize;

/// A catalogue file is either a bare list of definitions or a mapping with a
/// `definitions` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Bare(Vec<NodeDefinition>),
    Wrapped(DefinitionCatalog),
}

pub fn parse_catalog(yaml: &str) -> Result<DefinitionCatalog> {
    let file: CatalogFile = serde_yaml_ng::from_str(yaml).context("invalid definition catalogue")?;
    let definitions = match file {
        CatalogFile::Bare(definitions) => definitions,
        CatalogFile::Wrapped(catalog) => catalog.definitions,
    };

    let mut seen = HashSet::new();
    for definition in &definitions {
        if definition.id.trim().is_empty() {
            bail!("definition catalogue contains an entry with an empty id");
        }
        if !seen.insert(definition.id.as_str()) {
            bail!("definition '{}' is declared more than once", definition.id);
        }
    }
    Ok(DefinitionCatalog::new(definitions))
}

pub async fn load_catalog(path: &Path) -> Result<DefinitionCatalog> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read definition catalogue {}", path.display()))?;
    let catalog = parse_catalog(&yaml).with_context(|| format!("in {}", path.display()))?;
    tracing::debug!(path = %path.display(), definitions = catalog.len(), "definition catalogue loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeloom_types::graph::HandleDirection;
    use tempfile::TempDir;

    #[test]
    fn wrapped_and_bare_forms_parse_the_same() {
        let wrapped = parse_catalog(
            r#"
definitions:
  - id: http.request
    type: action
    title: HTTP request
    handles:
      - id: in
        direction: input
      - id: out
        direction: output
        dataType: response
"#,
        )
        .unwrap();
        let bare = parse_catalog(
            r#"
- id: http.request
  type: action
  title: HTTP request
  handles:
    - id: in
      direction: input
    - id: out
      direction: output
      dataType: response
"#,
        )
        .unwrap();
        assert_eq!(wrapped, bare);

        let def = wrapped.get("http.request").unwrap();
        assert_eq!(def.node_type.as_deref(), Some("action"));
        assert_eq!(def.handles[1].direction, HandleDirection::Output);
        assert_eq!(def.handles[1].data_type.as_deref(), Some("response"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_catalog("- id: a\n- id: a\n").unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[tokio::test]
    async fn load_reports_path_on_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("defs.yaml");
        tokio::fs::write(&path, "definitions: 42\n").await.unwrap();

        let err = load_catalog(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("defs.yaml"));

        tokio::fs::write(&path, "definitions:\n  - id: note\n    defaults:\n      color: yellow\n")
            .await
            .unwrap();
        let catalog = load_catalog(&path).await.unwrap();
        assert_eq!(catalog.get("note").unwrap().defaults["color"], "yellow");
    }
}
