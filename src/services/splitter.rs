//! Deterministic partitioning of a source file into numbered part files.
//!
//! Parts for logical name `n` are written to `{work_root}/{n}/{n}_{i}` for
//! `i = 0..part_count`. Every part is exactly `chunk_size` bytes except the
//! last, which may be shorter.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};
use tracing::{error, info};

/// Outcome of a split. Callers must compare `written` against `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub dir: PathBuf,
    pub expected: u32,
    pub written: u32,
    pub file_size: u64,
}

impl SplitReport {
    pub fn is_complete(&self) -> bool {
        self.written == self.expected
    }
}

/// `ceil(file_size / chunk_size)`; zero for an empty file. `None` when the
/// count does not fit in a `u32`.
pub fn expected_parts(file_size: u64, chunk_size: u64) -> Option<u32> {
    u32::try_from(file_size.div_ceil(chunk_size)).ok()
}

/// Name of part `index` for `logical_name`.
pub fn part_file_name(logical_name: &str, index: u32) -> String {
    format!("{}_{}", logical_name, index)
}

/// Numeric suffix after the final `_`, if any.
pub fn part_index(file_name: &str) -> Option<u64> {
    file_name
        .rsplit_once('_')
        .and_then(|(_, suffix)| suffix.parse().ok())
}

/// Split `source` into parts under a working directory created for
/// `logical_name` inside `work_root`.
///
/// A failed part write is logged and counted as missing; partial part files
/// are left in place for diagnosis.
pub async fn split(
    source: &Path,
    logical_name: &str,
    chunk_size: u64,
    work_root: &Path,
) -> io::Result<SplitReport> {
    if chunk_size == 0 {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "chunk size must be positive",
        ));
    }

    let mut file = File::open(source).await?;
    let file_size = file.metadata().await?.len();
    let expected = expected_parts(file_size, chunk_size).ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("{file_size} bytes in chunks of {chunk_size} needs too many parts"),
        )
    })?;

    let dir = work_root.join(logical_name);
    fs::create_dir_all(&dir).await?;

    // At least one byte so an empty source still gets a valid buffer.
    let buf_len = usize::try_from(chunk_size.min(file_size).max(1))
        .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;
    let mut buf = vec![0u8; buf_len];
    let mut written = 0;
    for i in 0..expected {
        let n = read_block(&mut file, &mut buf).await?;
        let part_path = dir.join(part_file_name(logical_name, i));
        match write_part(&part_path, &buf[..n]).await {
            Ok(()) => written += 1,
            Err(err) => error!(
                part_index = i,
                byte_offset = u64::from(i) * chunk_size,
                path = %part_path.display(),
                "failed to write part: {}",
                err
            ),
        }
    }

    if written == expected {
        info!(parts = expected, file_size, "all parts saved");
    } else {
        error!("only {} out of {} parts were saved", written, expected);
    }

    Ok(SplitReport {
        dir,
        expected,
        written,
        file_size,
    })
}

/// Fill `buf` from `reader`, stopping early only at end of input.
async fn read_block<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn write_part(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut out = File::create(path).await?;
    out.write_all(data).await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const C: u64 = 16;

    fn sample(len: u64) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    /// Concatenate parts in ascending suffix order.
    async fn merge(dir: &Path) -> Vec<u8> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort_by_key(|n| part_index(n).unwrap());
        let mut out = Vec::new();
        for name in names {
            out.extend(fs::read(dir.join(name)).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn split_then_merge_reproduces_source() {
        for len in [0, 1, C - 1, C, C + 1, 10 * C + 7] {
            let tmp = tempdir().unwrap();
            let source = tmp.path().join("source.bin");
            let data = sample(len);
            fs::write(&source, &data).await.unwrap();

            let report = split(&source, "source", C, &tmp.path().join("work"))
                .await
                .unwrap();
            assert!(report.is_complete());
            assert_eq!(report.expected, len.div_ceil(C) as u32, "len {len}");
            assert_eq!(report.file_size, len);
            assert_eq!(merge(&report.dir).await, data, "len {len}");
        }
    }

    #[tokio::test]
    async fn parts_are_named_sequentially() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("movie.mkv");
        fs::write(&source, sample(3 * C)).await.unwrap();

        let report = split(&source, "movie", C, tmp.path()).await.unwrap();
        assert_eq!(report.dir, tmp.path().join("movie"));
        for i in 0..3 {
            let part = fs::read(report.dir.join(format!("movie_{i}"))).await.unwrap();
            assert_eq!(part.len() as u64, C);
        }
        assert!(!report.dir.join("movie_3").exists());
    }

    #[test]
    fn part_count_is_ceiling() {
        assert_eq!(expected_parts(0, 8), Some(0));
        assert_eq!(expected_parts(1, 8), Some(1));
        assert_eq!(expected_parts(8, 8), Some(1));
        assert_eq!(expected_parts(9, 8), Some(2));
        assert_eq!(expected_parts(20 * 1024 * 1024, 8 * 1024 * 1024), Some(3));
        assert_eq!(expected_parts(u64::from(u32::MAX), 1), Some(u32::MAX));
        assert_eq!(expected_parts(u64::from(u32::MAX) + 1, 1), None);
    }

    #[tokio::test]
    async fn small_file_with_huge_chunk_size_splits_into_one_part() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("tiny.txt");
        fs::write(&source, b"abc").await.unwrap();

        let report = split(&source, "tiny", u64::MAX, tmp.path()).await.unwrap();
        assert_eq!(report.expected, 1);
        assert!(report.is_complete());
        assert_eq!(fs::read(report.dir.join("tiny_0")).await.unwrap(), b"abc");
    }

    #[test]
    fn part_index_reads_final_suffix() {
        assert_eq!(part_index("my_file_12"), Some(12));
        assert_eq!(part_index("report_0"), Some(0));
        assert_eq!(part_index("report"), None);
        assert_eq!(part_index("report_x"), None);
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = split(&tmp.path().join("nope"), "nope", C, tmp.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
