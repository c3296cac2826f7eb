use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde_json::{Map, Value};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::platform::KeyValueStore;

/// [KeyValueStore] persisted as one json object in a file. Every operation is a complete locked
/// read-modify-write of the file, so the ui reading the same file never sees a half written
/// state.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        async fn extract(file: &Path) -> std::result::Result<String, std::io::Error> {
            let mut file = File::open(file).await?;
            file.lock_shared()?;
            let mut content = String::new();
            let result = file.read_to_string(&mut content).await;
            file.unlock_async().await?;
            result.map(|_| content)
        }

        match extract(&self.path).await {
            Ok(content) => Ok(parse_items(&self.path, &content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::update_with_file(&self.path, &mut file, change).await;
        file.unlock_async().await?;
        result
    }

    async fn update_with_file<F>(path: &Path, file: &mut File, change: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        let mut items = parse_items(path, &content);

        change(&mut items);

        let buffer = serde_json::to_vec(&items)?;
        file.set_len(0).await?;
        file.seek(std::io::SeekFrom::Start(0)).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        debug!("Stored {} keys into {:?}", items.len(), path);
        Ok(())
    }
}

fn parse_items(path: &Path, content: &str) -> Map<String, Value> {
    if content.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Map<String, Value>>(content) {
        Ok(items) => items,
        Err(e) => {
            // Might happen if the process was killed mid write.
            warn!("Store {:?} is corrupted, starting from scratch: {e}", path);
            Map::new()
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: Vec<String>) -> Result<Map<String, Value>> {
        let mut items = self.read_all().await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| items.remove(&key).map(|value| (key, value)))
            .collect())
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        self.read_all().await
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<()> {
        self.update(move |items| items.extend(new_items)).await
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        self.update(move |items| {
            for key in keys {
                items.remove(&key);
            }
        })
        .await
    }
}
