//! Windows 初始密码生成
//!
//! 规则：长度 16~23；至少包含一个大写字母、小写字母、数字和符号；
//! 不得包含用户名或保留名称 (admin/Administrator/idcadmin) 的任意 3 字符子串。
//!
//! 前 4 个字符依次为大写、小写、数字、符号。追加字符后一旦出现禁用子串，
//! 截断回这 4 个字符继续追加，而不是从头生成，因此截断后组成规则依然成立。

use rand::Rng;

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!$#@%^&*()-_=+[]{},.<>?/;:";
const ALL_CHARS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!$#@%^&*()-_=+[]{},.<>?/;:";

/// 保留名称
pub const RESERVED_NAMES: [&str; 3] = ["admin", "Administrator", "idcadmin"];

pub const MIN_PASSWORD_LENGTH: usize = 16;
pub const MAX_PASSWORD_LENGTH: usize = 23;

const PREFIX_LENGTH: usize = 4;

/// 为指定用户生成随机密码
pub fn generate_password(username: &str) -> String {
    generate_password_with(username, &mut rand::thread_rng())
}

/// 使用给定随机源生成密码
pub fn generate_password_with<R: Rng + ?Sized>(username: &str, rng: &mut R) -> String {
    let forbidden = forbidden_substrings(username);
    let length = MIN_PASSWORD_LENGTH + rng.gen_range(0..=(MAX_PASSWORD_LENGTH - MIN_PASSWORD_LENGTH));

    let mut password = composition_prefix(rng, &forbidden);
    while password.len() < length {
        password.push(pick(ALL_CHARS, rng));
        if contains_any(&password, &forbidden) {
            password.truncate(PREFIX_LENGTH);
        }
    }
    password
}

/// 用户名和保留名称的所有 3 字符子串 (区分大小写)
pub fn forbidden_substrings(username: &str) -> Vec<String> {
    let mut substrings: Vec<String> = Vec::new();
    for source in std::iter::once(username).chain(RESERVED_NAMES) {
        let chars: Vec<char> = source.chars().collect();
        for window in chars.windows(3) {
            let s: String = window.iter().collect();
            if !substrings.contains(&s) {
                substrings.push(s);
            }
        }
    }
    substrings
}

// 前缀本身也可能撞上用户名的子串 (如用户名 "Ab1")，撞上时重新抽取
fn composition_prefix<R: Rng + ?Sized>(rng: &mut R, forbidden: &[String]) -> String {
    loop {
        let prefix: String = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS]
            .iter()
            .map(|class| pick(class, rng))
            .collect();
        if !contains_any(&prefix, forbidden) {
            return prefix;
        }
    }
}

fn pick<R: Rng + ?Sized>(chars: &str, rng: &mut R) -> char {
    let bytes = chars.as_bytes();
    bytes[rng.gen_range(0..bytes.len())] as char
}

fn contains_any(password: &str, forbidden: &[String]) -> bool {
    forbidden.iter().any(|s| password.contains(s.as_str()))
}
