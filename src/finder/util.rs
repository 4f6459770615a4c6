use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding, GB18030, UTF_8, WINDOWS_1252};
use std::io::{self, Read};
use std::path::Path;

/// 注释起始符，开启“忽略注释”后每行从这里开始的内容不参与匹配
pub const COMMENT_SENTINEL: char = '$';

/// 获取小写的扩展名（不带点）
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// 判断文件扩展名是否在过滤列表中，列表中的后缀已统一为 ".xxx" 小写格式
pub fn has_listed_extension(path: &Path, extensions: &[String]) -> bool {
    match lowercase_extension(path) {
        Some(ext) => extensions
            .iter()
            .any(|listed| listed.strip_prefix('.') == Some(ext.as_str())),
        None => false,
    }
}

/// 尽量读满缓冲区，返回实际读取的字节数，0 表示已到文件末尾
pub fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// 根据头部采样选出需要同时解码的编码
///
/// 有 BOM 时只用 BOM 指定的编码；头部是合法 UTF-8 时只用 UTF-8。
/// 否则 UTF-8（非法字节替换）始终保留，再加上 GB18030，
/// GB18030 也解不干净时再加 Windows-1252，这样混有坏字节或二进制段的文件
/// 仍能搜到其中的非 ASCII 文本。采样末尾被截断的多字节字符不算错误。
pub fn candidate_encodings(lead: &[u8]) -> Vec<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(lead) {
        return vec![encoding];
    }

    if decodes_cleanly(UTF_8, lead) {
        vec![UTF_8]
    } else if decodes_cleanly(GB18030, lead) {
        vec![UTF_8, GB18030]
    } else {
        vec![UTF_8, GB18030, WINDOWS_1252]
    }
}

fn decodes_cleanly(encoding: &'static Encoding, bytes: &[u8]) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(bytes.len()) else {
        return false;
    };
    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(bytes, &mut out, false);
    matches!(result, DecoderResult::InputEmpty)
}

/// 分块解码器，跨块的多字节字符由内部状态衔接
pub struct ChunkDecoder {
    decoder: Decoder,
}

impl ChunkDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        ChunkDecoder {
            decoder: encoding.new_decoder_with_bom_removal(),
        }
    }

    /// 解码一块数据，非法字节替换为 U+FFFD
    pub fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let mut out = String::with_capacity(self.capacity_for(bytes.len()));
        let mut input = bytes;
        loop {
            let (result, read, _) = self.decoder.decode_to_string(input, &mut out, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => return out,
                CoderResult::OutputFull => {
                    let needed = self.capacity_for(input.len());
                    out.reserve(needed);
                }
            }
        }
    }

    fn capacity_for(&self, len: usize) -> usize {
        self.decoder
            .max_utf8_buffer_length(len)
            .unwrap_or_else(|| len.saturating_mul(3).max(16))
    }
}

/// 按行去掉注释部分
///
/// 记住当前行是否已处于注释中，所以文本可以按任意位置切块送入。
#[derive(Debug, Default)]
pub struct CommentStripper {
    in_comment: bool,
}

impl CommentStripper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strip(&mut self, text: &str, out: &mut String) {
        for segment in text.split_inclusive('\n') {
            let ends_line = segment.ends_with('\n');

            if !self.in_comment {
                match segment.find(COMMENT_SENTINEL) {
                    Some(idx) => {
                        out.push_str(&segment[..idx]);
                        self.in_comment = true;
                    }
                    None => {
                        out.push_str(segment);
                        continue;
                    }
                }
            }

            if ends_line {
                out.push('\n');
                self.in_comment = false;
            }
        }
    }
}

/// 取字符串末尾的 n 个字符
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
