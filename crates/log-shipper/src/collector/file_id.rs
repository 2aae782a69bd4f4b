//! 파일 식별자: 디바이스 + inode
//!
//! 이름이 바뀌어도 inode는 유지되므로, 같은 경로의 식별자가 달라졌다면
//! 다른 파일로 교체된(로테이션된) 것입니다.

use std::fmt;
use std::fs::Metadata;

/// 디바이스 ID + inode 번호
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// 메타데이터에서 식별자를 얻습니다.
    ///
    /// inode 개념이 없는 플랫폼에서는 `None`을 반환하며,
    /// 이 경우 로테이션은 경로 소멸과 크기 축소로만 감지됩니다.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    pub fn dev(&self) -> u64 {
        self.dev
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn same_file_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "x").unwrap();

        let first = FileId::from_metadata(&fs::metadata(&path).unwrap());
        let second = FileId::from_metadata(&fs::metadata(&path).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn rename_keeps_id_and_recreate_changes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        let rotated = dir.path().join("a.log.1");
        fs::write(&path, "x").unwrap();
        let original = FileId::from_metadata(&fs::metadata(&path).unwrap());

        fs::rename(&path, &rotated).unwrap();
        assert_eq!(
            FileId::from_metadata(&fs::metadata(&rotated).unwrap()),
            original
        );

        fs::write(&path, "y").unwrap();
        assert_ne!(FileId::from_metadata(&fs::metadata(&path).unwrap()), original);
    }

    #[test]
    fn display_format() {
        assert_eq!(FileId::new(2049, 131).to_string(), "2049:131");
    }
}
