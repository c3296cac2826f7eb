use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::{
    config::{block_page_for_origin, Settings},
    domain::SchemePolicy,
};

/// Arguments the browser passes when it launches the host, plus overrides for debugging.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct HostArgs {
    /// Origin of the extension that started the host, e.g. `chrome-extension://<id>/`.
    pub origin: Option<String>,
    /// Handle of the calling window. Passed by the browser on windows.
    #[arg(long = "parent-window", hide = true)]
    pub parent_window: Option<String>,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Page blocked navigations are redirected to. Defaults to the block page of the extension.
    #[arg(long = "block-page")]
    pub block_page: Option<String>,
    /// Page tabs are sent to when blocking is lifted.
    #[arg(long = "safe-page")]
    pub safe_page: Option<String>,
    #[arg(long = "tick-secs", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_secs: Option<u64>,
    /// Track time on the browser's own pages too.
    #[arg(long = "track-internal-pages")]
    pub track_internal_pages: bool,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log_filter: Option<LevelFilter>,
}

impl HostArgs {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let block_page = match (&self.block_page, &self.origin) {
            (Some(page), _) => page.clone(),
            (None, Some(origin)) => block_page_for_origin(origin),
            (None, None) => anyhow::bail!("Either the extension origin or --block-page is required"),
        };

        let mut settings = Settings::new(block_page);
        if let Some(page) = &self.safe_page {
            settings.safe_page_url = page.clone();
        }
        if let Some(secs) = self.tick_secs {
            settings.tick_interval = Duration::from_secs(secs);
        }
        if self.track_internal_pages {
            settings.scheme_policy = SchemePolicy::with_internal_pages();
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use crate::domain::SchemePolicy;

    use super::HostArgs;

    #[test]
    fn test_browser_launch() {
        let args = HostArgs::parse_from(["tabtally-host", "chrome-extension://abcdef/"]);
        let settings = args.settings().unwrap();
        assert_eq!(
            settings.block_page_url(),
            "chrome-extension://abcdef/block.html"
        );
        assert_eq!(settings.scheme_policy, SchemePolicy::web_only());

        let windows = HostArgs::parse_from([
            "tabtally-host",
            "chrome-extension://abcdef/",
            "--parent-window=0",
        ]);
        assert_eq!(windows.parent_window.as_deref(), Some("0"));
    }

    #[test]
    fn test_overrides() {
        let args = HostArgs::parse_from([
            "tabtally-host",
            "--block-page",
            "https://example.org/blocked",
            "--safe-page",
            "about:blank",
            "--tick-secs",
            "30",
            "--track-internal-pages",
        ]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.block_page_url(), "https://example.org/blocked");
        assert_eq!(settings.safe_page_url, "about:blank");
        assert_eq!(settings.tick_interval, Duration::from_secs(30));
        assert_eq!(settings.scheme_policy, SchemePolicy::with_internal_pages());
    }

    #[test]
    fn test_missing_block_page() {
        let args = HostArgs::parse_from(["tabtally-host"]);
        assert!(args.settings().is_err());
        assert!(HostArgs::try_parse_from(["tabtally-host", "--tick-secs", "0"]).is_err());
    }
}
