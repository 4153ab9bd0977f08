//! Archive member listing, dispatched on the sniffed MIME type.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::warn;

type Lister = fn(File) -> io::Result<Vec<String>>;

/// MIME types with a member lister.
const LISTERS: &[(&str, Lister)] = &[
    ("application/x-tar", list_tar_plain),
    ("application/gzip", list_tar_gz),
    ("application/x-bzip2", list_tar_bz2),
    ("application/zip", list_zip),
];

/// Whether `mimetype` has a member lister.
pub fn is_listable(mimetype: &str) -> bool {
    lister_for(mimetype).is_some()
}

fn lister_for(mimetype: &str) -> Option<Lister> {
    LISTERS
        .iter()
        .find(|(mime, _)| *mime == mimetype)
        .map(|(_, lister)| *lister)
}

/// List the members of the archive at `path`, sorted.
///
/// Returns an empty list for MIME types without a lister.
pub fn list_members(path: &Path, mimetype: &str) -> io::Result<Vec<String>> {
    let Some(lister) = lister_for(mimetype) else {
        return Ok(Vec::new());
    };
    let mut members = lister(File::open(path)?)?;
    members.sort();
    Ok(members)
}

/// [`list_members`] on the blocking pool. A file that claims an archive type
/// but fails to parse gets an empty list; the upload itself is unaffected.
pub async fn list_members_blocking(path: PathBuf, mimetype: String) -> Vec<String> {
    if !is_listable(&mimetype) {
        return Vec::new();
    }
    let result = tokio::task::spawn_blocking(move || list_members(&path, &mimetype)).await;
    match result {
        Ok(Ok(members)) => members,
        Ok(Err(e)) => {
            warn!(error = %e, "archive member listing failed");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "archive member listing task failed");
            Vec::new()
        }
    }
}

fn list_tar<R: Read>(reader: R) -> io::Result<Vec<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let kind = entry.header().entry_type();
        if kind.is_file() || kind.is_dir() {
            members.push(entry.path()?.to_string_lossy().into_owned());
        }
    }
    Ok(members)
}

fn list_tar_plain(file: File) -> io::Result<Vec<String>> {
    list_tar(file)
}

fn list_tar_gz(file: File) -> io::Result<Vec<String>> {
    list_tar(flate2::read::GzDecoder::new(file))
}

fn list_tar_bz2(file: File) -> io::Result<Vec<String>> {
    list_tar(bzip2::read::BzDecoder::new(file))
}

fn list_zip(file: File) -> io::Result<Vec<String>> {
    let archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
    Ok(archive.file_names().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn tar_bytes(names: &[&str]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for name in names {
            let data = name.as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn lists_plain_tar_sorted() {
        let file = write_temp(&tar_bytes(&["zeta.txt", "alpha.txt", "dir/mid.txt"]));
        let members = list_members(file.path(), "application/x-tar").unwrap();
        assert_eq!(members, vec!["alpha.txt", "dir/mid.txt", "zeta.txt"]);
    }

    #[test]
    fn lists_gzipped_tar() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_bytes(&["b.txt", "a.txt"])).unwrap();
        let file = write_temp(&encoder.finish().unwrap());
        let members = list_members(file.path(), "application/gzip").unwrap();
        assert_eq!(members, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn lists_bzipped_tar() {
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&tar_bytes(&["only.txt"])).unwrap();
        let file = write_temp(&encoder.finish().unwrap());
        let members = list_members(file.path(), "application/x-bzip2").unwrap();
        assert_eq!(members, vec!["only.txt"]);
    }

    #[test]
    fn lists_zip_entries() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("second.txt", options).unwrap();
        writer.write_all(b"2").unwrap();
        writer.start_file("first.txt", options).unwrap();
        writer.write_all(b"1").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let file = write_temp(&bytes);
        let members = list_members(file.path(), "application/zip").unwrap();
        assert_eq!(members, vec!["first.txt", "second.txt"]);
    }

    #[test]
    fn unknown_type_is_empty() {
        let file = write_temp(b"not an archive");
        assert!(list_members(file.path(), "text/plain").unwrap().is_empty());
        assert!(!is_listable("image/png"));
    }

    #[tokio::test]
    async fn corrupt_archive_yields_empty_list() {
        let file = write_temp(b"\x1f\x8bnot really gzip");
        let members =
            list_members_blocking(file.path().to_path_buf(), "application/gzip".into()).await;
        assert!(members.is_empty());
    }
}
