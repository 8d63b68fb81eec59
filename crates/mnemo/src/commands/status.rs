use mnemo_core::{HeuristicCounter, ResultState};
use mnemo_engine::total_active_tokens;
use mnemo_store::{ResultStore, SqliteStore};
use std::path::Path;

pub fn run(db: &str) -> anyhow::Result<()> {
    let db_path = Path::new(db);
    if !db_path.exists() {
        println!("No memory database at {}. Record some tool results first.", db);
        return Ok(());
    }

    let store = SqliteStore::new(db_path)?;
    let records = store.list()?;
    let groups = store.groups()?;

    println!("Tool results: {}", records.len());
    println!("=============");

    if records.is_empty() {
        println!("No tool results stored yet.");
        return Ok(());
    }

    let mut full = 0usize;
    let mut compressed = 0usize;
    let mut expanded = 0usize;
    let mut summarized = 0usize;
    for record in &records {
        match record.state {
            ResultState::Full => full += 1,
            ResultState::Compressed => compressed += 1,
            ResultState::Expanded => expanded += 1,
        }
        if record.summary.is_some() {
            summarized += 1;
        }
    }

    println!("By state:");
    println!("  FULL: {}", full);
    println!("  COMPRESSED: {}", compressed);
    println!("  EXPANDED: {}", expanded);
    println!("Summaries attached: {}", summarized);
    println!("Groups: {}", groups.len());

    let active = total_active_tokens(&store, &HeuristicCounter)?;
    let verbatim: usize = records.iter().map(|r| r.full_token_count).sum();
    println!();
    println!("Active set tokens: {}", active);
    println!("Verbatim tokens if fully expanded: {}", verbatim);

    println!("\nRecent (last 10):");
    for record in records.iter().rev().take(10) {
        println!(
            "  {} [{}] {} ({} tokens)",
            record.id,
            record.state.as_str(),
            record.tool_name,
            record.full_token_count
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_missing_db_is_ok() {
        assert!(run("/nonexistent/memory.db").is_ok());
    }

    #[test]
    fn test_status_empty_db() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("memory.db");
        // create the schema so the file exists
        SqliteStore::new(&path).unwrap();
        assert!(run(path.to_str().unwrap()).is_ok());
    }
}
