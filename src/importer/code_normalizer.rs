// ==========================================
// 库存计划后端 - 编码规范化器
// ==========================================
// 职责: 西里尔字母音译 + 两种互不兼容的编码规范化约定
// 约束: 纯函数、确定性、幂等 normalize(normalize(x)) == normalize(x)
// ==========================================

use crate::domain::entity::Normalization;
use std::collections::HashMap;
use std::sync::OnceLock;

// ==========================================
// 音译表（按匹配长度从长到短尝试）
// ==========================================
// 大写多字符簇整体首字母大写（Щ → Shch），其余字符逐个独立音译
const TRANSLIT_TABLE: &[(&str, &str)] = &[
    ("а", "a"),
    ("б", "b"),
    ("в", "v"),
    ("г", "g"),
    ("д", "d"),
    ("е", "e"),
    ("ё", "yo"),
    ("ж", "zh"),
    ("з", "z"),
    ("и", "i"),
    ("й", "y"),
    ("к", "k"),
    ("л", "l"),
    ("м", "m"),
    ("н", "n"),
    ("о", "o"),
    ("п", "p"),
    ("р", "r"),
    ("с", "s"),
    ("т", "t"),
    ("у", "u"),
    ("ф", "f"),
    ("х", "kh"),
    ("ц", "ts"),
    ("ч", "ch"),
    ("ш", "sh"),
    ("щ", "shch"),
    ("ъ", ""),
    ("ы", "y"),
    ("ь", ""),
    ("э", "e"),
    ("ю", "yu"),
    ("я", "ya"),
    ("А", "A"),
    ("Б", "B"),
    ("В", "V"),
    ("Г", "G"),
    ("Д", "D"),
    ("Е", "E"),
    ("Ё", "Yo"),
    ("Ж", "Zh"),
    ("З", "Z"),
    ("И", "I"),
    ("Й", "Y"),
    ("К", "K"),
    ("Л", "L"),
    ("М", "M"),
    ("Н", "N"),
    ("О", "O"),
    ("П", "P"),
    ("Р", "R"),
    ("С", "S"),
    ("Т", "T"),
    ("У", "U"),
    ("Ф", "F"),
    ("Х", "Kh"),
    ("Ц", "Ts"),
    ("Ч", "Ch"),
    ("Ш", "Sh"),
    ("Щ", "Shch"),
    ("Ъ", ""),
    ("Ы", "Y"),
    ("Ь", ""),
    ("Э", "E"),
    ("Ю", "Yu"),
    ("Я", "Ya"),
];

struct TranslitIndex {
    map: HashMap<&'static str, &'static str>,
    /// 最长键的码点数
    max_key_chars: usize,
}

fn translit_index() -> &'static TranslitIndex {
    static INDEX: OnceLock<TranslitIndex> = OnceLock::new();
    INDEX.get_or_init(|| TranslitIndex {
        map: TRANSLIT_TABLE.iter().copied().collect(),
        max_key_chars: TRANSLIT_TABLE
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(1),
    })
}

/// 音译：在每个位置上优先匹配最长的键，未命中的码点原样保留
pub fn transliterate(input: &str) -> String {
    let index = translit_index();
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let longest = index.max_key_chars.min(chars.len() - i);
        let hit = (1..=longest).rev().find_map(|len| {
            let candidate: String = chars[i..i + len].iter().collect();
            index
                .map
                .get(candidate.as_str())
                .map(|replacement| (len, *replacement))
        });

        match hit {
            Some((len, replacement)) => {
                out.push_str(replacement);
                i += len;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    out
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c.is_whitespace()
}

/// 首段：把开头的大写串转为小写；缩写后紧跟小写时保留最后一个大写字母（XMLHttp → xmlHttp）
fn lower_leading_upper_run(piece: &str) -> String {
    let chars: Vec<char> = piece.chars().collect();
    let run = chars.iter().take_while(|c| c.is_uppercase()).count();
    if run == 0 {
        return piece.to_string();
    }

    let lowered = if run > 1 && chars.get(run).is_some_and(|c| c.is_lowercase()) {
        run - 1
    } else {
        run
    };

    let mut out = String::with_capacity(piece.len());
    for c in &chars[..lowered] {
        out.extend(c.to_lowercase());
    }
    out.extend(&chars[lowered..]);
    out
}

/// 后续段：首字符大写；全大写段其余部分转小写（MSK → Msk）
fn capitalize_piece(piece: &str) -> String {
    let mut chars = piece.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest: String = chars.collect();
    let all_caps = !piece.chars().any(|c| c.is_lowercase());

    let mut out = String::with_capacity(piece.len());
    out.extend(first.to_uppercase());
    if all_caps {
        out.push_str(&rest.to_lowercase());
    } else {
        out.push_str(&rest);
    }
    out
}

/// 标识符规范化（仓库/平台等不透明编码）
///
/// 音译后按 `-` `_` 空白切分（连续分隔符合并、首尾分隔符丢弃），
/// 拼接为 lowerCamelCase；`@` `.` 与数字等其他字符原位保留。
pub fn normalize_identifier(input: &str) -> String {
    let transliterated = transliterate(input);
    transliterated
        .split(is_separator)
        .filter(|piece| !piece.is_empty())
        .enumerate()
        .map(|(idx, piece)| {
            if idx == 0 {
                lower_leading_upper_run(piece)
            } else {
                capitalize_piece(piece)
            }
        })
        .collect()
}

/// 保留型编码规范化（SKU 等大小写与标点有含义的编码）
///
/// 音译后仅删除全部空白（内部空格直接删除，不转为分隔符）。
pub fn normalize_code_preserve(input: &str) -> String {
    transliterate(input)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// 按实体约定规范化
pub fn normalize(input: &str, convention: Normalization) -> String {
    match convention {
        Normalization::Identifier => normalize_identifier(input),
        Normalization::CodePreserve => normalize_code_preserve(input),
    }
}
