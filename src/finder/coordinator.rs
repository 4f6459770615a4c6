//! 搜索调度
//!
//! 获取候选文件（缓存或遍历目录）、按后缀过滤、把每个文件的匹配任务交给线程池，
//! 再按完成顺序收集结果并通知调用方。停止请求只阻止新的任务和新的结果消费，
//! 已在运行的任务会自然结束，结果被丢弃。

use crate::finder::cache::{DirectoryCache, Fingerprint};
use crate::finder::cancel::CancellationToken;
use crate::finder::config::{FinderConfig, MatchResult, SearchRequest};
use crate::finder::error::{FinderError, Result};
use crate::finder::events::SearchObserver;
use crate::finder::matcher::{FileMatcher, MatchTerms};
use crate::finder::util::has_listed_extension;
use crate::finder::walk::{list_files, TreeListing};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// 等待结果时检查停止标志的间隔
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 一次搜索的结果
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// 按发现顺序排列的匹配文件
    pub matches: Vec<MatchResult>,
    /// 已处理的候选文件数
    pub processed: usize,
    /// 候选文件总数
    pub total: usize,
    /// 是否被中途停止
    pub stopped: bool,
}

/// 搜索引擎，持有一个长期存在的线程池
pub struct Searcher {
    pool: rayon::ThreadPool,
    config: FinderConfig,
    active: Mutex<CancellationToken>,
    listing_walks: AtomicUsize,
}

impl Searcher {
    pub fn new(config: FinderConfig) -> Result<Self> {
        let workers = config.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("finder-worker-{}", i))
            .panic_handler(|_| log::error!("匹配任务异常退出，该文件按不匹配处理"))
            .build()
            .map_err(|e| FinderError::ThreadPool(e.to_string()))?;

        log::debug!("线程池已创建，线程数: {}", workers);

        Ok(Searcher {
            pool,
            config,
            active: Mutex::new(CancellationToken::new()),
            listing_walks: AtomicUsize::new(0),
        })
    }

    /// 停止当前搜索，可在任意线程调用
    pub fn stop(&self) {
        self.lock_active().cancel();
    }

    /// 已执行的完整目录遍历次数（命中缓存时不遍历）
    pub fn listing_walks(&self) -> usize {
        self.listing_walks.load(Ordering::Relaxed)
    }

    fn lock_active(&self) -> MutexGuard<'_, CancellationToken> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 开始一次新的搜索，使用新的停止标志
    pub fn search(
        &self,
        request: &SearchRequest,
        cache: Option<&DirectoryCache>,
        observer: &mut dyn SearchObserver,
    ) -> SearchOutcome {
        let token = CancellationToken::new();
        *self.lock_active() = token.clone();
        self.search_with_token(request, cache, observer, &token)
    }

    /// 使用调用方提供的停止标志搜索
    pub fn search_with_token(
        &self,
        request: &SearchRequest,
        cache: Option<&DirectoryCache>,
        observer: &mut dyn SearchObserver,
        token: &CancellationToken,
    ) -> SearchOutcome {
        let started = Instant::now();
        log::info!(
            "开始搜索 {}，关键字: {:?}，排除: {:?}",
            request.root().display(),
            request.keywords(),
            request.exclude_keywords()
        );

        let files = self.collect_candidates(request.root(), cache, observer);
        let candidates = match request.extensions() {
            Some(extensions) => {
                let before = files.len();
                let filtered: Vec<PathBuf> = files
                    .into_iter()
                    .filter(|path| has_listed_extension(path, extensions))
                    .collect();
                observer.on_progress(
                    &format!("后缀名过滤：{} → {} 个文件", before, filtered.len()),
                    0,
                    0,
                );
                filtered
            }
            None => files,
        };

        let total = candidates.len();
        let mut outcome = SearchOutcome {
            total,
            ..Default::default()
        };

        if total == 0 {
            observer.on_progress("没有需要搜索的文件", 0, 0);
            return outcome;
        }

        observer.on_progress(&format!("准备搜索 {} 个文件...", total), 0, total);

        let matcher = Arc::new(FileMatcher::new(
            MatchTerms::new(request.keywords(), request.exclude_keywords()),
            request.ignore_comments(),
            self.config.max_file_size,
        ));
        let (sender, receiver) = mpsc::channel::<Option<MatchResult>>();

        let mut submitted = 0;
        for path in candidates {
            if token.is_cancelled() {
                break;
            }
            let sender = sender.clone();
            let matcher = Arc::clone(&matcher);
            let token = token.clone();
            self.pool.spawn(move || {
                // 停止后排队中的任务不再读文件
                if token.is_cancelled() {
                    return;
                }
                let _ = sender.send(matcher.match_file(&path));
            });
            submitted += 1;
        }
        drop(sender);

        let update_interval = (total / self.config.max_progress_updates.max(1)).max(1);

        while outcome.processed < submitted {
            if token.is_cancelled() {
                break;
            }

            let result = match receiver.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            outcome.processed += 1;

            let matched = result.is_some();
            if let Some(result) = result {
                observer.on_result(&result);
                outcome.matches.push(result);
                observer.on_stats(outcome.matches.len());
            }

            if matched || outcome.processed % update_interval == 0 || outcome.processed == total {
                observer.on_progress(
                    &format!(
                        "已搜索 {}/{} 个文件，找到 {} 个",
                        outcome.processed,
                        total,
                        outcome.matches.len()
                    ),
                    outcome.processed,
                    total,
                );
            }
        }

        outcome.stopped = token.is_cancelled();
        let summary = if outcome.stopped {
            format!(
                "搜索已停止！已处理 {} 个文件，找到 {} 个匹配文件",
                outcome.processed,
                outcome.matches.len()
            )
        } else {
            format!(
                "搜索完成！共处理 {} 个文件，找到 {} 个匹配文件",
                outcome.processed,
                outcome.matches.len()
            )
        };
        observer.on_progress(&summary, outcome.processed, total);
        log::info!("{}，用时 {:.2} 秒", summary, started.elapsed().as_secs_f64());

        outcome
    }

    /// 获取候选文件列表：优先用缓存，未命中时遍历目录并写入缓存
    fn collect_candidates(
        &self,
        root: &Path,
        cache: Option<&DirectoryCache>,
        observer: &mut dyn SearchObserver,
    ) -> Vec<PathBuf> {
        observer.on_progress("正在获取文件列表...", 0, 0);

        let cached = cache.map(|cache| (cache, Fingerprint::of(root)));
        if let Some((cache, fingerprint)) = &cached {
            if let Some(files) = cache.load(fingerprint) {
                log::debug!("命中文件列表缓存: {}", root.display());
                observer.on_progress(
                    &format!("使用缓存文件列表，共 {} 个文件", files.len()),
                    0,
                    0,
                );
                return files;
            }
        }

        observer.on_progress("正在扫描文件夹...", 0, 0);
        let listing = self.walk(root);
        if listing.errors > 0 {
            observer.on_progress(
                &format!("有 {} 个条目无法访问，已跳过", listing.errors),
                0,
                0,
            );
        }

        if let Some((cache, fingerprint)) = &cached {
            if let Err(e) = cache.store(fingerprint, &listing.files) {
                log::warn!("写入文件列表缓存失败: {}", e);
            }
        }

        observer.on_progress(
            &format!("扫描完成，共 {} 个文件", listing.files.len()),
            0,
            0,
        );
        listing.files
    }

    fn walk(&self, root: &Path) -> TreeListing {
        self.listing_walks.fetch_add(1, Ordering::Relaxed);
        list_files(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::events::SearchEvent;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn test_searcher() -> Searcher {
        Searcher::new(FinderConfig {
            cache_dir: None,
            workers: 4,
            ..FinderConfig::default()
        })
        .unwrap()
    }

    fn request(dir: &TempDir, keywords: &[&str]) -> SearchRequest {
        SearchRequest::new(dir.path(), keywords.iter().map(|k| k.to_string()).collect()).unwrap()
    }

    fn matched_set(outcome: &SearchOutcome) -> BTreeSet<(PathBuf, String)> {
        outcome
            .matches
            .iter()
            .map(|m| {
                let name = PathBuf::from(m.path.file_name().unwrap());
                (name, format!("{:.2}", m.size_kb))
            })
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("both.txt"), "Alpha and BETA").unwrap();
        fs::write(dir.path().join("only_alpha.txt"), "alpha only").unwrap();
        fs::write(dir.path().join("sub/nested.log"), "beta then alpha").unwrap();
        fs::write(dir.path().join("sub/excluded.txt"), "alpha beta draft").unwrap();
        dir
    }

    #[test]
    fn finds_files_containing_every_keyword() {
        let dir = sample_tree();
        let searcher = test_searcher();
        let mut events: Vec<SearchEvent> = Vec::new();
        let outcome = searcher.search(&request(&dir, &["alpha", "beta"]), None, &mut events);

        let names: BTreeSet<PathBuf> = matched_set(&outcome).into_iter().map(|(n, _)| n).collect();
        let expected: BTreeSet<PathBuf> = ["both.txt", "nested.log", "excluded.txt"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(names, expected);
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.processed, 4);
        assert!(!outcome.stopped);

        let match_events = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Match(_)))
            .count();
        assert_eq!(match_events, 3);
        assert!(events.contains(&SearchEvent::Stats { count: 3 }));
        assert!(matches!(
            events.last(),
            Some(SearchEvent::Progress { current: 4, total: 4, .. })
        ));
    }

    #[test]
    fn exclude_keywords_and_extension_filter_apply() {
        let dir = sample_tree();
        let searcher = test_searcher();
        let req = request(&dir, &["alpha"])
            .with_exclude_keywords(vec!["draft".into()])
            .with_extensions(Some(vec![".txt".into()]));
        let outcome = searcher.search(&req, None, &mut ());

        let names: BTreeSet<PathBuf> = matched_set(&outcome).into_iter().map(|(n, _)| n).collect();
        let expected: BTreeSet<PathBuf> =
            ["both.txt", "only_alpha.txt"].iter().map(PathBuf::from).collect();
        assert_eq!(names, expected);
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn repeated_search_yields_same_results() {
        let dir = sample_tree();
        let cache_dir = tempdir().unwrap();
        let cache = DirectoryCache::new(cache_dir.path());
        let searcher = test_searcher();
        let req = request(&dir, &["alpha"]);

        let first = searcher.search(&req, Some(&cache), &mut ());
        let second = searcher.search(&req, Some(&cache), &mut ());
        assert_eq!(matched_set(&first), matched_set(&second));
        assert_eq!(first.matches.len(), 4);
    }

    #[test]
    fn cached_listing_avoids_second_walk() {
        let dir = sample_tree();
        let cache_dir = tempdir().unwrap();
        let cache = DirectoryCache::new(cache_dir.path());
        let searcher = test_searcher();
        let req = request(&dir, &["beta"]);

        let first = searcher.search(&req, Some(&cache), &mut ());
        let mut events: Vec<SearchEvent> = Vec::new();
        let second = searcher.search(&req, Some(&cache), &mut events);

        assert_eq!(searcher.listing_walks(), 1);
        assert_eq!(first.total, second.total);
        assert!(events.iter().any(|e| matches!(
            e,
            SearchEvent::Progress { message, .. } if message.starts_with("使用缓存文件列表")
        )));
    }

    #[test]
    fn changed_directory_forces_fresh_walk() {
        let dir = sample_tree();
        let cache_dir = tempdir().unwrap();
        let cache = DirectoryCache::new(cache_dir.path());
        let searcher = test_searcher();
        let req = request(&dir, &["alpha"]);

        let first = searcher.search(&req, Some(&cache), &mut ());
        fs::write(dir.path().join("new.txt"), "fresh alpha").unwrap();
        let second = searcher.search(&req, Some(&cache), &mut ());
        assert_eq!(searcher.listing_walks(), 2);
        assert_eq!(second.total, first.total + 1);

        fs::remove_file(dir.path().join("only_alpha.txt")).unwrap();
        let third = searcher.search(&req, Some(&cache), &mut ());
        assert_eq!(searcher.listing_walks(), 3);
        assert_eq!(third.total, first.total);
    }

    #[test]
    fn without_cache_every_search_walks() {
        let dir = sample_tree();
        let searcher = test_searcher();
        let req = request(&dir, &["alpha"]);
        searcher.search(&req, None, &mut ());
        searcher.search(&req, None, &mut ());
        assert_eq!(searcher.listing_walks(), 2);
    }

    #[test]
    fn empty_candidate_set_returns_immediately() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();
        let searcher = test_searcher();
        let req = request(&dir, &["alpha"]).with_extensions(Some(vec!["rs".into()]));
        let mut events: Vec<SearchEvent> = Vec::new();
        let outcome = searcher.search(&req, None, &mut events);

        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.processed, 0);
        assert!(events
            .iter()
            .all(|e| matches!(e, SearchEvent::Progress { total: 0, .. })));
    }

    struct StopOnFirstMatch<'a> {
        searcher: &'a Searcher,
        seen: usize,
    }

    impl SearchObserver for StopOnFirstMatch<'_> {
        fn on_result(&mut self, _result: &MatchResult) {
            self.seen += 1;
            self.searcher.stop();
        }
    }

    #[test]
    fn stop_ends_search_early_with_partial_results() {
        let dir = tempdir().unwrap();
        for i in 0..300 {
            fs::write(dir.path().join(format!("f{i}.txt")), "needle").unwrap();
        }
        let searcher = test_searcher();
        let req = request(&dir, &["needle"]);

        let full = searcher.search(&req, None, &mut ());
        assert_eq!(full.matches.len(), 300);

        let mut observer = StopOnFirstMatch {
            searcher: &searcher,
            seen: 0,
        };
        let partial = searcher.search(&req, None, &mut observer);
        assert!(partial.stopped);
        assert_eq!(observer.seen, 1);
        assert_eq!(partial.matches.len(), 1);
        assert!(matched_set(&partial).is_subset(&matched_set(&full)));
    }

    struct CancelOnFirstMatch {
        token: CancellationToken,
        seen: usize,
    }

    impl SearchObserver for CancelOnFirstMatch {
        fn on_result(&mut self, _result: &MatchResult) {
            self.seen += 1;
            self.token.cancel();
        }
    }

    #[test]
    fn cancelled_search_returns_without_draining_queued_tasks() {
        let dir = tempdir().unwrap();
        // 带排除词时每个文件都要读完，排队中的任务足够慢
        let mut content = b"needle\n".to_vec();
        content.resize(64 * 1024, b'x');
        for i in 0..300 {
            fs::write(dir.path().join(format!("f{i}.txt")), &content).unwrap();
        }
        let searcher = Searcher::new(FinderConfig {
            cache_dir: None,
            workers: 1,
            ..FinderConfig::default()
        })
        .unwrap();
        let req = request(&dir, &["needle"]).with_exclude_keywords(vec!["absent".into()]);

        let token = CancellationToken::new();
        let mut observer = CancelOnFirstMatch {
            token: token.clone(),
            seen: 0,
        };
        let started = Instant::now();
        let outcome = searcher.search_with_token(&req, None, &mut observer, &token);
        let elapsed = started.elapsed();

        assert!(outcome.stopped);
        assert_eq!(outcome.total, 300);
        assert_eq!(outcome.processed, 1);
        assert!(outcome.processed < outcome.total);
        assert_eq!(observer.seen, 1);
        assert_eq!(outcome.matches.len(), 1);
        assert!(elapsed < Duration::from_secs(5), "search took {elapsed:?}");
    }

    #[test]
    fn unwritable_cache_directory_does_not_break_search() {
        let dir = sample_tree();
        let blocker = tempdir().unwrap();
        let plain_file = blocker.path().join("plain_file");
        fs::write(&plain_file, "not a directory").unwrap();
        let cache = DirectoryCache::new(plain_file.join("cache"));
        let searcher = test_searcher();
        let req = request(&dir, &["alpha", "beta"]);

        let first = searcher.search(&req, Some(&cache), &mut ());
        let second = searcher.search(&req, Some(&cache), &mut ());

        assert!(!first.stopped);
        assert_eq!(first.matches.len(), 3);
        assert_eq!(matched_set(&first), matched_set(&second));
        // 缓存写不进去，每次都重新遍历
        assert_eq!(searcher.listing_walks(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_still_searches_the_rest() {
        use std::os::unix::fs::PermissionsExt;

        let dir = sample_tree();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), "alpha beta").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let denied = fs::read_dir(&locked).is_err();

        let searcher = test_searcher();
        let mut events: Vec<SearchEvent> = Vec::new();
        let outcome = searcher.search(&request(&dir, &["alpha", "beta"]), None, &mut events);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let names: BTreeSet<PathBuf> = matched_set(&outcome).into_iter().map(|(n, _)| n).collect();
        for expected in ["both.txt", "nested.log", "excluded.txt"] {
            assert!(names.contains(&PathBuf::from(expected)));
        }
        assert!(!outcome.stopped);
        if denied {
            assert_eq!(outcome.total, 4);
            assert!(events.iter().any(|e| matches!(
                e,
                SearchEvent::Progress { message, .. } if message.contains("无法访问")
            )));
        }
    }

    #[test]
    fn stop_before_search_does_not_leak_into_next_search() {
        let dir = sample_tree();
        let searcher = test_searcher();
        searcher.stop();
        let outcome = searcher.search(&request(&dir, &["alpha"]), None, &mut ());
        assert!(!outcome.stopped);
        assert_eq!(outcome.matches.len(), 4);
    }

    #[test]
    fn cancelled_token_submits_no_work() {
        let dir = sample_tree();
        let searcher = test_searcher();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = searcher.search_with_token(&request(&dir, &["alpha"]), None, &mut (), &token);
        assert!(outcome.stopped);
        assert_eq!(outcome.processed, 0);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn progress_updates_are_throttled() {
        let dir = tempdir().unwrap();
        for i in 0..500 {
            fs::write(dir.path().join(format!("f{i}.txt")), "nothing here").unwrap();
        }
        let searcher = test_searcher();
        let mut events: Vec<SearchEvent> = Vec::new();
        let outcome = searcher.search(&request(&dir, &["needle"]), None, &mut events);

        assert_eq!(outcome.processed, 500);
        let fractional = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Progress { total, .. } if *total > 0))
            .count();
        assert!(fractional <= 102, "too many progress updates: {fractional}");
    }
}
