use rand::Rng;

/// Compression suffixes that keep the extension before them, so
/// `logs.tar.gz` splits into `logs` + `tar.gz`.
const COMPRESSION_SUFFIXES: &[&str] = &[".gz", ".xz", ".bz2", ".zst", ".lzma", ".lzo", ".z"];

/// Length of generated barenames.
pub const BARENAME_LEN: usize = 8;

/// Length of generated delete keys.
pub const DELETE_KEY_LEN: usize = 30;

const BARENAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Fallback extension when neither the filename nor the content yields one.
pub const FALLBACK_EXTENSION: &str = "file";

/// `.ext` suffix of the final path component, or `""`.
fn dot_extension(name: &str) -> &str {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.rfind('.').map_or("", |idx| &last[idx..])
}

/// Split a client filename into `(barename, extension)`.
///
/// Both halves are lowercased. The extension keeps only `[a-z0-9.-]` and
/// has no leading or trailing dot; it is empty when the name has none. The
/// barename is a slug and may be empty.
pub fn split_name(filename: &str) -> (String, String) {
    let name = filename.trim().to_lowercase();

    let mut ext_len = dot_extension(&name).len();
    if COMPRESSION_SUFFIXES.contains(&&name[name.len() - ext_len..]) {
        ext_len += dot_extension(&name[..name.len() - ext_len]).len();
    }
    let (bare, ext) = name.split_at(name.len() - ext_len);

    let extension: String = ext
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    let extension = extension.trim_matches('.').to_owned();

    (slugify(bare), extension)
}

/// Lowercase ASCII slug: runs of anything outside `[a-z0-9_-]` become one
/// `-`, and leading or trailing `-`/`_` are dropped.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches(['-', '_']).to_owned()
}

fn random_string(len: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect()
}

/// Random lowercase alphanumeric barename.
pub fn random_barename() -> String {
    random_string(BARENAME_LEN, BARENAME_CHARSET)
}

/// Random mixed-case alphanumeric delete key.
pub fn generate_delete_key() -> String {
    random_string(DELETE_KEY_LEN, KEY_CHARSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) {
        split_name(name)
    }

    fn pair(bare: &str, ext: &str) -> (String, String) {
        (bare.to_owned(), ext.to_owned())
    }

    #[test]
    fn splits_simple_names() {
        assert_eq!(split("photo.JPG"), pair("photo", "jpg"));
        assert_eq!(split("  Notes.txt "), pair("notes", "txt"));
        assert_eq!(split("README"), pair("readme", ""));
    }

    #[test]
    fn keeps_compression_chain() {
        assert_eq!(split("backup.tar.gz"), pair("backup", "tar.gz"));
        assert_eq!(split("dump.sql.zst"), pair("dump", "sql.zst"));
        assert_eq!(split("archive.gz"), pair("archive", "gz"));
        assert_eq!(split("a.b.c.txt"), pair("a-b-c", "txt"));
    }

    #[test]
    fn slugifies_barename() {
        assert_eq!(split("My Holiday Photo!.png"), pair("my-holiday-photo", "png"));
        assert_eq!(split("__weird--name__.md"), pair("weird-name", "md"));
        assert_eq!(split("snake_case_name.rs"), pair("snake_case_name", "rs"));
    }

    #[test]
    fn drops_unsafe_extension_chars() {
        assert_eq!(split("x.p$h%p"), pair("x", "php"));
        assert_eq!(split("x.tar-ball"), pair("x", "tar-ball"));
    }

    #[test]
    fn hidden_and_empty_names() {
        assert_eq!(split(".bashrc"), pair("", "bashrc"));
        assert_eq!(split(""), pair("", ""));
        assert_eq!(split("!!!.txt"), pair("", "txt"));
    }

    #[test]
    fn ignores_directories() {
        assert_eq!(split("dir.v2/file"), pair("dir-v2-file", ""));
    }

    #[test]
    fn non_ascii_becomes_separator() {
        assert_eq!(slugify("naïve café"), "na-ve-caf");
    }

    #[test]
    fn random_values_have_expected_shape() {
        let bare = random_barename();
        assert_eq!(bare.len(), BARENAME_LEN);
        assert!(bare.bytes().all(|b| BARENAME_CHARSET.contains(&b)));

        let key = generate_delete_key();
        assert_eq!(key.len(), DELETE_KEY_LEN);
        assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(generate_delete_key(), key);
    }
}
