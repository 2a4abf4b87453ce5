use anyhow::Result;
use mlbatch_config::MlbatchConfig;

use super::open_status_store;

pub async fn halt(key: &str, clear: bool, config: &MlbatchConfig) -> Result<()> {
    let store = open_status_store(&config.store)?;
    if clear {
        store.clear_halt(key).await?;
        println!("Cleared halt signal '{}'", key);
    } else {
        store.set_halt(key).await?;
        println!("Set halt signal '{}'", key);
    }
    Ok(())
}

pub async fn status(key: &str, count: Option<usize>, config: &MlbatchConfig) -> Result<()> {
    let store = open_status_store(&config.store)?;
    let statuses = store.statuses(key).await?;

    match count {
        Some(count) => {
            for index in 0..count {
                let status = statuses
                    .get(&index)
                    .map(|s| s.as_str())
                    .unwrap_or("unknown");
                println!("{}\t{}", index, status);
            }
        }
        None => {
            for (index, status) in &statuses {
                println!("{}\t{}", index, status);
            }
        }
    }
    Ok(())
}
