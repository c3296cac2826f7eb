use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

/// Name of the file holding counters and the block list inside the application directory.
pub const STORE_FILE_NAME: &str = "store.json";

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = env::var("LOCALAPPDATA")
                .or_else(|_| env::var("APPDATA"))
                .map(PathBuf::from)
                .map_err(|_| anyhow!("Couldn't find neither LOCALAPPDATA nor APPDATA"))?;
            path.push("tabtally");
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
            path.push("tabtally");
            path
        }
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

pub fn store_path(app_dir: &std::path::Path) -> PathBuf {
    app_dir.join(STORE_FILE_NAME)
}
