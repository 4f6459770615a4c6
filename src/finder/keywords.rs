/// 引号对照表：开引号 -> 对应的闭引号
const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'), // “ ”
    ('\u{2018}', '\u{2019}'), // ‘ ’
    ('\u{FF02}', '\u{FF02}'), // ＂
    ('\u{FF07}', '\u{FF07}'), // ＇
];

fn closing_quote(c: char) -> Option<char> {
    QUOTE_PAIRS
        .iter()
        .find(|(open, _)| *open == c)
        .map(|(_, close)| *close)
}

/// 解析关键字，支持用引号包裹含空格的短语
///
/// 引号外遇到开引号即进入引号段，引号段接在当前词后面，必须用与开引号配对的
/// 闭引号结束；未闭合的引号会把剩余内容作为最后一个关键字输出。
pub fn parse_keywords(text: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for c in text.chars() {
        match closing {
            Some(close) if c == close => {
                push_token(&mut keywords, &mut current);
                closing = None;
            }
            Some(_) => current.push(c),
            None => {
                if c.is_whitespace() {
                    push_token(&mut keywords, &mut current);
                } else if let Some(close) = closing_quote(c) {
                    closing = Some(close);
                } else {
                    current.push(c);
                }
            }
        }
    }

    push_token(&mut keywords, &mut current);
    keywords
}

fn push_token(keywords: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        keywords.push(token.to_string());
    }
    current.clear();
}

/// 解析后缀名列表
///
/// 返回 `None` 表示不过滤；每个后缀统一为小写并以点开头。
pub fn parse_extensions(text: &str) -> Option<Vec<String>> {
    let extensions: Vec<String> = text.split_whitespace().map(normalize_extension).collect();

    if extensions.is_empty() {
        None
    } else {
        Some(extensions)
    }
}

/// 统一后缀格式：小写，以点开头
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
