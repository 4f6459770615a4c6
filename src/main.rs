use clap::{Arg, ArgAction, Command};
use file_finder::finder::{
    parse_extensions, parse_keywords, sort_by_size, DirectoryCache, FinderConfig, MatchResult,
    SearchEvent, SearchOutcome, SearchRequest, Searcher, SortOrder,
};
use file_finder::utils::{init_logger, log_results_to_file, ProgressManager, RESULT_LOG_FILE};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::thread;

const USAGE: &str = r#"文件内容查找工具 (File Finder)

使用方法:
  file-finder --keyword <关键字> [选项]

基本选项:
  --keyword string
        要查找的关键字，空格分隔，文件必须包含全部关键字
        含空格的短语用引号包裹
        示例: --keyword 'error "connection reset"'

  --dir string
        指定搜索的起始目录 (默认: ".")

过滤选项:
  --ext string
        只搜索指定后缀的文件，空格分隔
        示例: --ext "py txt log"

  --exclude string
        包含任一排除关键字的文件不算匹配
        示例: --exclude "deprecated draft"

  --ignore-comments
        忽略每行 "$" 之后的内容

性能选项:
  --workers int
        线程池大小 (默认: CPU核心数的4倍)

  --max-size int
        跳过超过此大小的文件（MB，默认: 50）

缓存选项:
  --cache-dir string
        文件列表缓存目录
  --no-cache
        不使用文件列表缓存
  --clear-cache
        清空文件列表缓存

其他选项:
  --sort asc|desc
        按文件大小排序结果
  --log
        输出日志并把结果记录到 file_finder.log
"#;

/// 命令行参数解析
fn parse_args() -> clap::ArgMatches {
    Command::new("file-finder")
        .about("多关键字文件内容查找工具")
        .arg(
            Arg::new("keyword")
                .long("keyword")
                .help("要查找的关键字，文件必须包含全部关键字")
                .value_name("KEYWORD"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("指定搜索的起始目录")
                .default_value(".")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("ext")
                .long("ext")
                .help("只搜索指定后缀的文件，空格分隔")
                .value_name("EXT"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .help("包含任一排除关键字的文件不算匹配")
                .value_name("EXCLUDE"),
        )
        .arg(
            Arg::new("ignore-comments")
                .long("ignore-comments")
                .help("忽略每行 \"$\" 之后的内容")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .help("线程池大小")
                .value_name("WORKERS")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-size")
                .long("max-size")
                .help("跳过超过此大小的文件（MB）")
                .value_name("MAX_SIZE")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .help("文件列表缓存目录")
                .value_name("CACHE_DIR"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .help("不使用文件列表缓存")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("clear-cache")
                .long("clear-cache")
                .help("清空文件列表缓存")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sort")
                .long("sort")
                .help("按文件大小排序结果")
                .value_name("ORDER")
                .value_parser(["asc", "desc"]),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("输出日志并把结果记录到日志文件")
                .action(ArgAction::SetTrue),
        )
        .get_matches()
}

/// 创建搜索引擎配置
fn create_finder_config(matches: &clap::ArgMatches) -> FinderConfig {
    let mut config = FinderConfig::new();

    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.workers = (*workers).max(1);
    }

    if let Some(max_size) = matches.get_one::<u64>("max-size") {
        config.max_file_size = max_size.saturating_mul(1024 * 1024);
    }

    if let Some(cache_dir) = matches.get_one::<String>("cache-dir") {
        config.cache_dir = Some(PathBuf::from(cache_dir));
    }

    if matches.get_flag("no-cache") {
        config.cache_dir = None;
    }

    config
}

/// 创建搜索请求，参数不合法时直接退出
fn create_search_request(matches: &clap::ArgMatches, keyword_text: &str) -> SearchRequest {
    let dir = matches
        .get_one::<String>("dir")
        .map(String::as_str)
        .unwrap_or(".");

    let extensions = matches
        .get_one::<String>("ext")
        .and_then(|text| parse_extensions(text));

    let exclude = matches
        .get_one::<String>("exclude")
        .map(|text| parse_keywords(text))
        .unwrap_or_default();

    match SearchRequest::new(dir, parse_keywords(keyword_text)) {
        Ok(request) => request
            .with_extensions(extensions)
            .with_exclude_keywords(exclude)
            .with_ignore_comments(matches.get_flag("ignore-comments")),
        Err(e) => {
            eprintln!("错误: {}", e);
            process::exit(1);
        }
    }
}

/// 在后台线程执行搜索，主线程负责显示进度
fn run_search(
    searcher: Searcher,
    request: SearchRequest,
    cache: Option<DirectoryCache>,
) -> SearchOutcome {
    let (sender, receiver) = mpsc::channel::<SearchEvent>();

    let worker = thread::spawn(move || {
        let mut sender = sender;
        searcher.search(&request, cache.as_ref(), &mut sender)
    });

    let progress = ProgressManager::new();
    for event in receiver {
        progress.handle(&event);
    }
    progress.finish();

    match worker.join() {
        Ok(outcome) => outcome,
        Err(_) => {
            eprintln!("搜索线程异常退出");
            SearchOutcome::default()
        }
    }
}

/// 打印结果表格
fn print_result_table(results: &[MatchResult]) {
    const PATH_WIDTH: usize = 80;
    const SIZE_WIDTH: usize = 12;

    let line = "-".repeat(PATH_WIDTH + SIZE_WIDTH + 7);
    println!("{}", line);
    println!(
        "| {:<PATH_WIDTH$} | {:>SIZE_WIDTH$} |",
        "文件路径", "大小 (KB)"
    );
    println!("{}", line);

    for result in results {
        let path = result.path.display().to_string();
        println!(
            "| {:<PATH_WIDTH$} | {:>SIZE_WIDTH$.2} |",
            path, result.size_kb
        );
    }

    println!("{}", line);
}

fn print_search_results(outcome: &SearchOutcome, keyword: &str) {
    if outcome.matches.is_empty() {
        println!("\n❌ 未找到包含 '\x1b[33m{}\x1b[0m' 的文件", keyword);
        return;
    }

    println!(
        "\n✅ 找到 \x1b[32m{}\x1b[0m 个匹配文件:\n",
        outcome.matches.len()
    );
    print_result_table(&outcome.matches);
}

fn main() {
    // 如果没有参数，打印使用信息
    if std::env::args().len() <= 1 {
        println!("{}", USAGE);
        return;
    }

    let matches = parse_args();

    let enable_log = matches.get_flag("log");
    if let Err(e) = init_logger(enable_log) {
        eprintln!("初始化日志失败: {}", e);
    }

    let config = create_finder_config(&matches);
    let cache = config.cache_dir.as_ref().map(DirectoryCache::new);

    if matches.get_flag("clear-cache") {
        match &cache {
            Some(cache) => match cache.clear() {
                Ok(removed) => println!("已清空缓存，删除 {} 个缓存文件", removed),
                Err(e) => eprintln!("清空缓存失败: {}", e),
            },
            None => println!("未启用缓存"),
        }
    }

    let Some(keyword_text) = matches.get_one::<String>("keyword") else {
        if !matches.get_flag("clear-cache") {
            eprintln!("错误: 请指定搜索关键字（--keyword）");
            println!("\n{}", USAGE);
            process::exit(1);
        }
        return;
    };

    let request = create_search_request(&matches, keyword_text);

    let searcher = match Searcher::new(config) {
        Ok(searcher) => searcher,
        Err(e) => {
            eprintln!("错误: {}", e);
            process::exit(1);
        }
    };

    let mut outcome = run_search(searcher, request, cache);

    match matches.get_one::<String>("sort").map(String::as_str) {
        Some("asc") => sort_by_size(&mut outcome.matches, SortOrder::Ascending),
        Some("desc") => sort_by_size(&mut outcome.matches, SortOrder::Descending),
        _ => {}
    }

    if enable_log {
        if let Err(e) = log_results_to_file(Path::new(RESULT_LOG_FILE), keyword_text, &outcome.matches)
        {
            eprintln!("记录日志失败: {}", e);
        }
    }

    print_search_results(&outcome, keyword_text);
}
