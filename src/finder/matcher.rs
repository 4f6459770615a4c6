//! 单文件内容匹配
//!
//! 处理顺序：扩展名黑名单 -> 文件大小 -> 头部二进制检测 -> 选出候选编码 ->
//! 分块解码、去注释、转小写 -> 排除词 -> 全部关键字命中即接受。
//! 任何IO或解码错误都视为不匹配。

use crate::finder::classify::{classify_content, classify_extension, ContentClass};
use crate::finder::config::{MatchResult, DEFAULT_MAX_FILE_SIZE};
use crate::finder::util::{
    candidate_encodings, read_chunk, tail_chars, ChunkDecoder, CommentStripper,
};
use encoding_rs::Encoding;
use memchr::memmem;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// 每次读取的块大小
pub const CHUNK_SIZE: usize = 64 * 1024;

/// 预处理后的关键字（小写）
#[derive(Debug, Clone)]
struct Term {
    finder: memmem::Finder<'static>,
}

impl Term {
    fn new(text: &str) -> Self {
        Term {
            finder: memmem::Finder::new(text.as_bytes()).into_owned(),
        }
    }

    fn is_in(&self, haystack: &str) -> bool {
        self.finder.find(haystack.as_bytes()).is_some()
    }
}

/// 一次搜索中所有文件共用的关键字集合
#[derive(Debug, Clone)]
pub struct MatchTerms {
    required: Vec<Term>,
    exclude: Vec<Term>,
    /// 块之间需要保留的重叠字符数
    overlap_chars: usize,
}

impl MatchTerms {
    pub fn new(required: &[String], exclude: &[String]) -> Self {
        let mut required_lower: Vec<String> = required.iter().map(|k| k.to_lowercase()).collect();
        required_lower.sort();
        required_lower.dedup();
        let exclude_lower: Vec<String> = exclude.iter().map(|k| k.to_lowercase()).collect();

        let longest = required_lower
            .iter()
            .chain(exclude_lower.iter())
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(0);

        MatchTerms {
            required: required_lower.iter().map(|k| Term::new(k)).collect(),
            exclude: exclude_lower.iter().map(|k| Term::new(k)).collect(),
            overlap_chars: longest.saturating_sub(1),
        }
    }
}

/// 文件匹配器
#[derive(Debug, Clone)]
pub struct FileMatcher {
    terms: MatchTerms,
    ignore_comments: bool,
    max_file_size: u64,
}

impl FileMatcher {
    pub fn new(terms: MatchTerms, ignore_comments: bool, max_file_size: u64) -> Self {
        FileMatcher {
            terms,
            ignore_comments,
            max_file_size,
        }
    }

    /// 判断单个文件是否匹配
    pub fn match_file(&self, path: &Path) -> Option<MatchResult> {
        if classify_extension(path) == ContentClass::Binary {
            return None;
        }

        let metadata = fs::metadata(path).ok()?;
        let size = metadata.len();
        if !metadata.is_file() || size == 0 || size > self.max_file_size {
            return None;
        }

        let file = File::open(path).ok()?;
        match self.scan(path, file) {
            Ok(true) => Some(MatchResult::new(path, size)),
            Ok(false) => None,
            Err(e) => {
                log::debug!("读取 {} 失败: {}", path.display(), e);
                None
            }
        }
    }

    fn scan<R: Read>(&self, path: &Path, mut reader: R) -> io::Result<bool> {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut len = read_chunk(&mut reader, &mut buffer)?;
        if len == 0 {
            return Ok(false);
        }

        if classify_content(path, &buffer[..len]) == ContentClass::Binary {
            return Ok(false);
        }

        let encodings = candidate_encodings(&buffer[..len]);
        let mut scan = ContentScan::new(&self.terms, &encodings, self.ignore_comments);

        loop {
            let last = len < CHUNK_SIZE;
            if let Some(verdict) = scan.feed(&buffer[..len], last) {
                return Ok(verdict);
            }
            if last {
                break;
            }
            len = read_chunk(&mut reader, &mut buffer)?;
        }

        Ok(scan.all_found())
    }
}

/// 同一份字节按某种编码解码后的文本流
struct DecodedView {
    decoder: ChunkDecoder,
    stripper: Option<CommentStripper>,
    carry: String,
}

impl DecodedView {
    fn new(encoding: &'static Encoding, ignore_comments: bool) -> Self {
        DecodedView {
            decoder: ChunkDecoder::new(encoding),
            stripper: ignore_comments.then(CommentStripper::new),
            carry: String::new(),
        }
    }

    /// 解码一块字节，返回带上一块重叠部分的小写文本
    fn window(&mut self, bytes: &[u8], last: bool) -> String {
        let text = self.decoder.decode(bytes, last);
        let mut window = std::mem::take(&mut self.carry);
        match self.stripper.as_mut() {
            Some(stripper) => {
                let mut stripped = String::with_capacity(text.len());
                stripper.strip(&text, &mut stripped);
                window.push_str(&stripped.to_lowercase());
            }
            None => window.push_str(&text.to_lowercase()),
        }
        window
    }
}

/// 逐块扫描的状态
///
/// 每种候选编码各自解码，关键字在任一种解码结果中出现即算找到。
struct ContentScan<'a> {
    terms: &'a MatchTerms,
    found: Vec<bool>,
    remaining: usize,
    views: Vec<DecodedView>,
}

impl<'a> ContentScan<'a> {
    fn new(terms: &'a MatchTerms, encodings: &[&'static Encoding], ignore_comments: bool) -> Self {
        ContentScan {
            terms,
            found: vec![false; terms.required.len()],
            remaining: terms.required.len(),
            views: encodings
                .iter()
                .map(|encoding| DecodedView::new(*encoding, ignore_comments))
                .collect(),
        }
    }

    /// 送入一块原始字节，能确定结果时返回 `Some`
    fn feed(&mut self, bytes: &[u8], last: bool) -> Option<bool> {
        for view in &mut self.views {
            let window = view.window(bytes, last);

            if self.terms.exclude.iter().any(|term| term.is_in(&window)) {
                return Some(false);
            }

            for (found, term) in self.found.iter_mut().zip(&self.terms.required) {
                if !*found && term.is_in(&window) {
                    *found = true;
                    self.remaining -= 1;
                }
            }

            view.carry = tail_chars(&window, self.terms.overlap_chars).to_string();
        }

        // 有排除词时必须读完整个文件
        if self.remaining == 0 && self.terms.exclude.is_empty() {
            return Some(true);
        }
        None
    }

    fn all_found(&self) -> bool {
        self.remaining == 0
    }
}

/// 使用默认大小限制匹配单个文件
pub fn match_file(
    path: &Path,
    required: &[String],
    exclude: &[String],
    ignore_comments: bool,
) -> Option<MatchResult> {
    FileMatcher::new(
        MatchTerms::new(required, exclude),
        ignore_comments,
        DEFAULT_MAX_FILE_SIZE,
    )
    .match_file(path)
}
