//! Run orchestration: the single-flight update task, its run log, and the
//! recurring schedule.

pub mod runlog;
pub mod schedule;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use thiserror::Error;

use crate::fetch::Fetcher;
use crate::generator::{load_template, render_clash, render_raw_links};
use crate::models::RawLink;
use crate::parser::node_manip::{build_node_set, order_primary_first};
use crate::parser::extract_links;
use crate::settings::{self, SourceConfig, JSON_KIND};
use crate::store::{ConfigStore, NodeCache, StoreError};
use crate::utils::url_decode;
use runlog::{LogEntry, LogLevel, RunLog};
use schedule::ScheduleHandle;

pub const RAW_LINK_KEY: &str = "raw_link_config";
pub const RAW_LINK_KIND: &str = "raw";
pub const CLASH_KEY: &str = "clash_config";
pub const CLASH_KIND: &str = "clash";
pub const LOGS_KEY: &str = "update_logs";

/// Default Clash template location, relative to the working directory.
pub const DEFAULT_TEMPLATE_HEAD: &str = "templates/clash_head.yaml";
pub const DEFAULT_TEMPLATE_TAIL: &str = "templates/clash_tail.yaml";

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("an update task is already running")]
    AlreadyRunning,

    #[error("no feed urls configured")]
    NoSources,

    #[error("no valid nodes were collected")]
    NoNodes,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Counters reported at the end of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub links: usize,
    pub nodes: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct UpdateStatus {
    pub running: bool,
    pub schedule_active: bool,
    pub last_update: Option<String>,
    pub next_update: Option<String>,
    pub artifacts_exist: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
    pub modified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedFiles {
    pub raw_link: ArtifactInfo,
    pub clash: ArtifactInfo,
}

/// Resets the running flag on every exit path of a run.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the task state and the live run log; constructed once at process
/// start and shared with whatever exposes the trigger/status API.
pub struct UpdateService {
    store: Arc<dyn ConfigStore>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn NodeCache>,
    running: AtomicBool,
    run_log: RunLog,
    schedule: Mutex<Option<ScheduleHandle>>,
    template_head: PathBuf,
    template_tail: PathBuf,
}

impl UpdateService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn NodeCache>,
    ) -> Self {
        UpdateService {
            store,
            fetcher,
            cache,
            running: AtomicBool::new(false),
            run_log: RunLog::default(),
            schedule: Mutex::new(None),
            template_head: PathBuf::from(DEFAULT_TEMPLATE_HEAD),
            template_tail: PathBuf::from(DEFAULT_TEMPLATE_TAIL),
        }
    }

    pub fn with_templates(mut self, head: impl Into<PathBuf>, tail: impl Into<PathBuf>) -> Self {
        self.template_head = head.into();
        self.template_tail = tail.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Appends to the run log, mirrors the buffer to the store, and echoes
    /// the message through the process logger.
    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.run_log.push(level, message);
        if let Ok(body) = serde_json::to_string(&self.run_log.snapshot()) {
            if let Err(e) = self.store.upsert(LOGS_KEY, JSON_KIND, &body) {
                warn!("failed to mirror run log to store: {}", e);
            }
        }
    }

    /// Triggers one update run. Fails synchronously only when a run is
    /// already in progress; everything else surfaces through the run log
    /// and the returned terminal status.
    pub fn run_update(&self) -> Result<RunSummary, UpdateError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.log(LogLevel::Warning, "update task already running");
            return Err(UpdateError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.log(LogLevel::Info, "starting update task");
        match self.run_update_inner() {
            Ok(summary) => {
                self.log(
                    LogLevel::Success,
                    format!("update finished, {} nodes in the clash set", summary.nodes),
                );
                Ok(summary)
            }
            Err(e) => {
                self.log(LogLevel::Error, format!("update failed: {}", e));
                Err(e)
            }
        }
    }

    /// Dry run: fetches and parses the feeds without writing any artifact.
    pub fn run_validate(&self) -> Result<RunSummary, UpdateError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.log(LogLevel::Warning, "update task already running");
            return Err(UpdateError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.log(LogLevel::Info, "starting validation task");
        let config = settings::load_config(self.store.as_ref());
        let urls = config.sanitized_feed_urls();
        if urls.is_empty() {
            self.log(LogLevel::Error, "no feed urls configured");
            return Err(UpdateError::NoSources);
        }
        let links = self.collect_links(&urls);
        if links.is_empty() {
            self.log(LogLevel::Error, "validation failed, no valid nodes");
            return Err(UpdateError::NoNodes);
        }
        let links = order_primary_first(links);
        let set = build_node_set(&links, &config.filter_keywords);
        self.log(
            LogLevel::Success,
            format!(
                "validation finished, {} of {} links decoded",
                set.proxies.len(),
                links.len()
            ),
        );
        Ok(RunSummary {
            links: links.len(),
            nodes: set.proxies.len(),
            filtered: set.filtered,
            duplicates: set.duplicates,
            failed: set.failed,
        })
    }

    fn run_update_inner(&self) -> Result<RunSummary, UpdateError> {
        let config = settings::load_config(self.store.as_ref());
        let urls = config.sanitized_feed_urls();
        if urls.is_empty() {
            self.log(
                LogLevel::Error,
                "no feed urls configured, add sources before running",
            );
            return Err(UpdateError::NoSources);
        }

        let output_dir = resolve_output_dir(&config.output_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        self.log(
            LogLevel::Info,
            format!("output directory: {}", output_dir.display()),
        );

        if config.filter_keywords.is_empty() {
            self.log(LogLevel::Warning, "no filter keywords configured");
        } else {
            self.log(
                LogLevel::Info,
                format!("filter keywords: {}", config.filter_keywords.join(", ")),
            );
        }

        let links = self.collect_links(&urls);
        if links.is_empty() {
            self.log(LogLevel::Error, "no valid nodes collected, nothing written");
            return Err(UpdateError::NoNodes);
        }
        let links = order_primary_first(links);

        let (raw_blob, raw_filtered) = render_raw_links(&links, &config.filter_keywords);
        if raw_filtered > 0 {
            self.log(
                LogLevel::Info,
                format!("filtered {} links out of the raw-link artifact", raw_filtered),
            );
        }
        let raw_path = output_dir.join(&config.raw_link_filename);
        std::fs::write(&raw_path, &raw_blob)?;
        self.store.upsert(RAW_LINK_KEY, RAW_LINK_KIND, &raw_blob)?;
        self.log(
            LogLevel::Success,
            format!("raw-link artifact saved: {}", raw_path.display()),
        );

        let set = build_node_set(&links, &config.filter_keywords);
        for uri in &set.failed_samples {
            self.log(LogLevel::Warning, format!("undecodable link skipped: {}", uri));
        }
        if set.failed > set.failed_samples.len() {
            self.log(
                LogLevel::Warning,
                format!("{} undecodable links in total", set.failed),
            );
        }
        if set.filtered > 0 {
            self.log(
                LogLevel::Info,
                format!("filtered {} nodes by keyword", set.filtered),
            );
        }
        if set.duplicates > 0 {
            self.log(
                LogLevel::Info,
                format!("removed {} duplicate nodes", set.duplicates),
            );
        }
        if !set.type_counts.is_empty() {
            let mut counts: Vec<_> = set.type_counts.iter().collect();
            counts.sort();
            let stats = counts
                .iter()
                .map(|(tag, n)| format!("{}: {}", tag, n))
                .collect::<Vec<_>>()
                .join(", ");
            self.log(LogLevel::Info, format!("decoded node types: {}", stats));
        }

        if set.proxies.is_empty() {
            self.log(
                LogLevel::Error,
                "no nodes survived for the clash artifact, keeping previous one",
            );
        } else {
            let template = load_template(&self.template_head, &self.template_tail);
            if template.is_none() {
                self.log(
                    LogLevel::Warning,
                    "clash template missing, using built-in fallback config",
                );
            }
            let clash_yaml = render_clash(&set.proxies, &set.names, template);
            let clash_path = output_dir.join(&config.clash_filename);
            std::fs::write(&clash_path, &clash_yaml)?;
            self.store.upsert(CLASH_KEY, CLASH_KIND, &clash_yaml)?;
            self.log(
                LogLevel::Success,
                format!(
                    "clash artifact saved: {} ({} nodes)",
                    clash_path.display(),
                    set.proxies.len()
                ),
            );
        }

        settings::record_last_update(self.store.as_ref())?;
        match self.cache.invalidate() {
            Ok(()) => self.log(LogLevel::Info, "node cache invalidated"),
            Err(e) => self.log(
                LogLevel::Warning,
                format!("node cache invalidation failed: {}", e),
            ),
        }

        Ok(RunSummary {
            links: links.len(),
            nodes: set.proxies.len(),
            filtered: set.filtered,
            duplicates: set.duplicates,
            failed: set.failed,
        })
    }

    /// Fetches every feed sequentially, tolerating individual failures.
    fn collect_links(&self, urls: &[String]) -> Vec<RawLink> {
        let total = urls.len();
        self.log(
            LogLevel::Info,
            format!("starting node collection from {} feeds", total),
        );
        let mut links = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            self.log(
                LogLevel::Info,
                format!("[{}/{}] downloading feed: {}", index + 1, total, url),
            );
            let body = match self.fetcher.fetch(url) {
                Ok(body) => body,
                Err(e) => {
                    self.log(
                        LogLevel::Error,
                        format!("[{}/{}] download failed: {}", index + 1, total, e),
                    );
                    continue;
                }
            };

            let extracted = extract_links(&body);
            if let Some(sample) = extracted.first() {
                if let Some((_, fragment)) = sample.split_once('#') {
                    if !fragment.is_empty() {
                        self.log(
                            LogLevel::Info,
                            format!("sample node name: '{}'", url_decode(fragment)),
                        );
                    }
                }
            }
            if let Some(stats) = scheme_stats(&extracted) {
                self.log(LogLevel::Info, format!("link types: {}", stats));
            }
            self.log(
                LogLevel::Success,
                format!(
                    "[{}/{}] extracted {} links from {}",
                    index + 1,
                    total,
                    extracted.len(),
                    url
                ),
            );
            links.extend(extracted.into_iter().map(|uri| RawLink::new(uri, index)));
        }
        self.log(
            LogLevel::Success,
            format!("node collection finished, {} links total", links.len()),
        );
        links
    }

    pub fn status(&self) -> UpdateStatus {
        let config = settings::load_config(self.store.as_ref());
        let files = self.generated_files(&config);
        UpdateStatus {
            running: self.is_running(),
            schedule_active: self.schedule.lock().unwrap().is_some(),
            last_update: settings::last_update_time(self.store.as_ref()).map(|t| t.to_rfc3339()),
            next_update: settings::next_update_time(self.store.as_ref(), &config)
                .map(|t| t.to_rfc3339()),
            artifacts_exist: files.raw_link.exists && files.clash.exists,
        }
    }

    /// On-disk artifact report for the status API.
    pub fn generated_files(&self, config: &SourceConfig) -> GeneratedFiles {
        let dir = resolve_output_dir(&config.output_dir)
            .unwrap_or_else(|_| PathBuf::from(&config.output_dir));
        GeneratedFiles {
            raw_link: artifact_info(dir.join(&config.raw_link_filename)),
            clash: artifact_info(dir.join(&config.clash_filename)),
        }
    }

    /// The most recent `limit` run-log entries. Falls back to the store row
    /// when the in-memory buffer is empty (fresh process).
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        if !self.run_log.is_empty() {
            return self.run_log.tail(limit);
        }
        match self.store.get(LOGS_KEY, JSON_KIND) {
            Some(row) => match serde_json::from_str::<Vec<LogEntry>>(&row.value) {
                Ok(entries) => {
                    let skip = entries.len().saturating_sub(limit);
                    entries.into_iter().skip(skip).collect()
                }
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    /// Drops all but the most recent `keep_recent` entries and re-mirrors.
    pub fn clear_logs(&self, keep_recent: usize) {
        self.run_log.clear_old(keep_recent);
        if let Ok(body) = serde_json::to_string(&self.run_log.snapshot()) {
            if let Err(e) = self.store.upsert(LOGS_KEY, JSON_KIND, &body) {
                warn!("failed to mirror run log to store: {}", e);
            }
        }
    }
}

fn resolve_output_dir(dir: &str) -> std::io::Result<PathBuf> {
    let path = Path::new(dir);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn artifact_info(path: PathBuf) -> ArtifactInfo {
    match std::fs::metadata(&path) {
        Ok(meta) => ArtifactInfo {
            exists: true,
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
            path,
        },
        Err(_) => ArtifactInfo {
            exists: false,
            size: 0,
            modified: None,
            path,
        },
    }
}

/// Per-scheme link statistics line, e.g. `SS: 2, VMess: 5`.
fn scheme_stats(links: &[String]) -> Option<String> {
    let labels = [
        ("ss://", "SS"),
        ("ssr://", "SSR"),
        ("vmess://", "VMess"),
        ("trojan://", "Trojan"),
        ("vless://", "VLESS"),
        ("hysteria2://", "Hysteria2"),
        ("hy2://", "Hysteria2"),
        ("tuic://", "TUIC"),
    ];
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for link in links {
        for (prefix, label) in labels {
            if link.starts_with(prefix) {
                match counts.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((label, 1)),
                }
                break;
            }
        }
    }
    if counts.is_empty() {
        return None;
    }
    Some(
        counts
            .iter()
            .map(|(label, n)| format!("{}: {}", label, n))
            .collect::<Vec<_>>()
            .join(", "),
    )
}
