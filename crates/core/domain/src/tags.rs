//! 标签词汇约定
//!
//! - 用户标签：比较前统一小写
//! - 能力标签：全大写字符串，与设备的能力集比较，而不是标签集
//!
//! 判定只看字母字符是否全部大写，调用方构造查询时必须遵守这一约定。

/// 是否为能力标签：至少含一个字母，且所有字母均为大写。
pub fn is_capability_tag(tag: &str) -> bool {
    let mut has_alpha = false;
    for ch in tag.chars() {
        if ch.is_alphabetic() {
            has_alpha = true;
            if !ch.is_uppercase() {
                return false;
            }
        }
    }
    has_alpha
}

/// 规范化标签：去除首尾空白，能力标签原样保留，其余小写。
pub fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    if is_capability_tag(trimmed) {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// 拆分为（小写用户标签，能力标签）。
pub fn split_tags<S: AsRef<str>>(tags: &[S]) -> (Vec<String>, Vec<String>) {
    let mut user_tags = Vec::new();
    let mut capability_tags = Vec::new();
    for tag in tags {
        let tag = tag.as_ref();
        if is_capability_tag(tag) {
            capability_tags.push(tag.to_string());
        } else {
            user_tags.push(tag.to_lowercase());
        }
    }
    (user_tags, capability_tags)
}
