pub const DEFAULT_LABEL: &str = "cluster";

const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

pub fn generic_label(group: usize) -> String {
    format!("{DEFAULT_LABEL}_{group}")
}

/// Folder name for a group: keywords joined with `_`, or the generic label
/// when there are none. Always sanitized.
pub fn folder_name(keywords: &[String], group: usize, max_len: usize) -> String {
    let raw = if keywords.is_empty() {
        generic_label(group)
    } else {
        keywords.join("_")
    };
    sanitize_folder_name(&raw, max_len)
}

/// Longest name most filesystems accept for one path component, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Makes `raw` usable as a single path component on any platform. Never
/// fails and never returns an empty string. The result has at most
/// `max_len` characters and at most [`MAX_NAME_BYTES`] bytes.
pub fn sanitize_folder_name(raw: &str, max_len: usize) -> String {
    let max_len = max_len.max(1);
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_control() || ILLEGAL.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let truncated: String = replaced.trim().chars().take(max_len).collect();
    let mut name = trim_name(truncate_bytes(&truncated, MAX_NAME_BYTES)).to_string();
    if name.is_empty() {
        name = DEFAULT_LABEL.chars().take(max_len).collect();
    }
    if is_reserved(&name) {
        name = unreserve(&name, max_len);
    }
    name
}

/// `name` with `suffix` appended, shortening `name` so the suffix survives
/// both length limits.
pub fn suffixed_folder_name(name: &str, suffix: &str, max_len: usize) -> String {
    let keep = max_len.max(1).saturating_sub(suffix.chars().count());
    let stem: String = name.chars().take(keep).collect();
    let mut stem = truncate_bytes(&stem, MAX_NAME_BYTES.saturating_sub(suffix.len())).to_string();
    loop {
        let name = sanitize_folder_name(&format!("{stem}{suffix}"), max_len);
        // a reserved stem grows by one `_`, which can push the suffix out
        if name.ends_with(suffix) || stem.pop().is_none() {
            return name;
        }
    }
}

/// Longest prefix of `s` within `max_bytes` that ends on a char boundary.
fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Windows rejects names ending in a dot or a space.
fn trim_name(s: &str) -> &str {
    s.trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Device names stay reserved whatever the extension, so the `_` goes on
/// the stem: `nul.txt` becomes `nul_.txt`.
fn unreserve(name: &str, max_len: usize) -> String {
    let (stem, ext) = match name.find('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    };
    let stem = stem.trim_end();
    let fits = |s: &str| s.chars().count() <= max_len && s.len() <= MAX_NAME_BYTES;
    let with_ext = format!("{stem}_{ext}");
    if fits(&with_ext) {
        return with_ext;
    }
    let bare = format!("{stem}_");
    if fits(&bare) {
        return bare;
    }
    let mut short: String = stem.chars().take(max_len.saturating_sub(1)).collect();
    short.push('_');
    short.chars().take(max_len).collect()
}

fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_keywords() {
        let keywords = vec!["rust".to_string(), "borrow checker".to_string()];
        assert_eq!(folder_name(&keywords, 0, 200), "rust_borrow checker");
    }

    #[test]
    fn empty_keywords_use_group_id() {
        assert_eq!(folder_name(&[], 4, 200), "cluster_4");
    }

    #[test]
    fn replaces_illegal_characters() {
        assert_eq!(sanitize_folder_name("a<b>c:d\"e/f\\g|h?i*j", 200), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_folder_name("tab\there\u{0}", 200), "tab_here_");
    }

    #[test]
    fn trims_and_truncates() {
        assert_eq!(sanitize_folder_name("  notes  ", 200), "notes");
        let long = "x".repeat(500);
        assert_eq!(sanitize_folder_name(&long, 200).chars().count(), 200);
        assert_eq!(sanitize_folder_name("abc   def", 4), "abc");
    }

    #[test]
    fn empty_and_dot_names_fall_back() {
        assert_eq!(sanitize_folder_name("", 200), DEFAULT_LABEL);
        assert_eq!(sanitize_folder_name("   ", 200), DEFAULT_LABEL);
        assert_eq!(sanitize_folder_name("..", 200), DEFAULT_LABEL);
    }

    #[test]
    fn reserved_device_names_are_suffixed() {
        assert_eq!(sanitize_folder_name("CON", 200), "CON_");
        assert_eq!(sanitize_folder_name("nul.txt", 200), "nul_.txt");
        assert_eq!(sanitize_folder_name("Com1.tar.gz", 200), "Com1_.tar.gz");
        assert_eq!(sanitize_folder_name("prn.md", 4), "prn_");
        assert_eq!(sanitize_folder_name("aux", 3), "au_");
        assert_eq!(sanitize_folder_name("console", 200), "console");
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(sanitize_folder_name("notes...", 200), "notes");
        assert_eq!(sanitize_folder_name("notes . .", 200), "notes");
        assert_eq!(sanitize_folder_name("v1.2", 200), "v1.2");
        assert_eq!(sanitize_folder_name("abc.  def", 5), "abc");
    }

    #[test]
    fn multibyte_names_fit_in_255_bytes() {
        let cyrillic = format!("{}_{}", "заметка".repeat(15), "проект".repeat(15));
        let name = sanitize_folder_name(&cyrillic, 200);
        assert!(name.len() <= MAX_NAME_BYTES);
        assert!(name.chars().count() <= 200);
        assert!(name.starts_with("заметка"));

        let cjk = "笔记".repeat(150);
        let name = sanitize_folder_name(&cjk, 200);
        assert_eq!(name.len(), 255);
        assert_eq!(name.chars().count(), 85);
    }

    #[test]
    fn suffix_survives_byte_limit() {
        let stem = "проект".repeat(40);
        let name = suffixed_folder_name(&stem, "_7", 200);
        assert!(name.ends_with("_7"));
        assert!(name.len() <= MAX_NAME_BYTES);
        assert_eq!(suffixed_folder_name("abcdef", "_12", 6), "abc_12");
        assert_eq!(suffixed_folder_name("con.xyz", "_1", 9), "con_.xy_1");
    }

    #[test]
    fn naming_is_idempotent() {
        let keywords = vec!["tokio".to_string(), "runtime".to_string()];
        assert_eq!(folder_name(&keywords, 1, 200), folder_name(&keywords, 1, 200));
    }
}
