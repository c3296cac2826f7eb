use std::{
    io::{self, Write},
    path::Path,
};

use anyhow::Result;
use serde_json::{Map, Value};

use crate::{
    platform::KeyValueStore,
    storage::{block_list_value, domain_counters, json_store::JsonFileStore, BLOCK_LIST_KEY},
    utils::{dir::store_path, time::format_seconds},
};

/// Prints accumulated time per domain, longest first, followed by the session block list.
pub async fn print_report(app_dir: &Path) -> Result<()> {
    let store = JsonFileStore::new(store_path(app_dir))?;
    let items = store.get_all().await?;
    write_report(&items, io::stdout().lock())?;
    Ok(())
}

pub fn write_report(items: &Map<String, Value>, mut output: impl Write) -> io::Result<()> {
    let mut counters = domain_counters(items);
    // Ties are broken by name so the output is stable.
    counters.sort_by(|(a_domain, a), (b_domain, b)| b.cmp(a).then_with(|| a_domain.cmp(b_domain)));

    if counters.is_empty() {
        writeln!(output, "No time tracked yet")?;
    }
    for (domain, seconds) in counters {
        writeln!(output, "{}\t{}", format_seconds(seconds), domain)?;
    }

    let blocked = block_list_value(items.get(BLOCK_LIST_KEY));
    if !blocked.is_empty() {
        writeln!(output)?;
        writeln!(output, "Blocked for this session:")?;
        for domain in blocked {
            writeln!(output, "\t{domain}")?;
        }
    }
    Ok(())
}
