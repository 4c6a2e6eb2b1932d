use std::io::Read as _;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use tokio::io::AsyncWriteExt as _;

use crate::event::TreeChangedEvent;

/// Parse a JSON array of events, reporting where in the document a parse
/// failed.
pub fn parse_events(json: &str) -> anyhow::Result<Vec<TreeChangedEvent>> {
    let des = &mut serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(des).context("couldn't parse TreeChanged events")
}

pub fn read_events_from_stdin() -> anyhow::Result<Vec<TreeChangedEvent>> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    parse_events(&buffer)
}

/// Write `value` as JSON to `output`, or to stdout if there is none.
pub async fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let Some(output) = output else {
        serde_json::to_writer_pretty(std::io::stdout(), value)?;
        println!();
        return Ok(());
    };

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut f = tokio::fs::File::create(output).await?;
    f.write_all(&serde_json::to_vec_pretty(value)?)
        .await
        .context("Failed to write output to disk")?;

    tracing::info!("Successfully wrote {}", output.display());
    Ok(())
}

#[test]
fn parse_error_has_path() {
    let err = parse_events(r#"[{"args": {"preRoot": "0x1", "postRoot": "0x2", "kind": 7}}]"#)
        .unwrap_err();
    assert!(format!("{err:#}").contains("[0].args.kind"), "{err:#}");
}

#[test]
fn parse_empty() {
    assert_eq!(parse_events("[]").unwrap(), vec![]);
}
