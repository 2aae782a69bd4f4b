//! 파일 탐색: 스트림별 include/exclude glob 패턴을 실제 파일 목록으로 확장
//!
//! 탐색은 실패하지 않습니다. 잘못된 패턴이나 읽을 수 없는 경로는
//! 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use glob::{MatchOptions, Pattern, glob};
use tailstream_core::config::StreamConfig;
use tracing::{debug, info, warn};

/// 하나 이상의 파일이 매칭된 스트림
#[derive(Debug, Clone)]
pub struct DiscoveredStream {
    /// 스트림 설정 (실행 동안 불변)
    pub stream: Arc<StreamConfig>,
    /// 매칭된 파일 (중복 없음, 패턴 순서)
    pub files: Vec<PathBuf>,
}

/// 스트림 목록을 파일 매핑으로 확장합니다.
///
/// 식별자(스트림 ID 또는 URL)가 없거나 include 패턴이 없는 스트림은 제외됩니다.
/// 매칭 파일이 없는 스트림은 결과에 포함되지 않습니다.
/// 결과 순서는 입력 스트림 순서를 따릅니다.
pub fn discover(streams: &[StreamConfig]) -> Vec<DiscoveredStream> {
    let mut discovered = Vec::new();

    for stream in streams {
        let name = stream.display_name();

        if !stream.has_destination() {
            warn!(
                stream = name,
                "stream has neither stream_id nor url, excluding it"
            );
            continue;
        }
        if stream.paths.is_empty() {
            warn!(stream = name, "stream has no include paths, excluding it");
            continue;
        }

        let files = find_files(&stream.paths, &stream.exclude);
        if files.is_empty() {
            debug!(stream = name, "no files matched");
            continue;
        }

        info!(stream = name, files = files.len(), "discovered log files");
        discovered.push(DiscoveredStream {
            stream: Arc::new(stream.clone()),
            files,
        });
    }

    discovered
}

/// include 패턴을 확장하고 exclude 패턴에 매칭되는 경로를 제거합니다.
///
/// `**`는 0개 이상의 디렉토리에 매칭됩니다.
/// exclude는 전체 경로 기준으로 매칭하므로 `**/*.gz`는 모든 깊이의 gzip 파일을 제외합니다.
/// `*`는 include와 마찬가지로 `/`를 넘지 않습니다.
pub fn find_files(include: &[String], exclude: &[String]) -> Vec<PathBuf> {
    let options = MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    let excludes: Vec<Pattern> = exclude
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = p.as_str(), error = %e, "invalid exclude pattern, skipping");
                None
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in include {
        let matches = match glob(pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(pattern = pattern.as_str(), error = %e, "invalid include pattern, skipping");
                continue;
            }
        };

        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!(error = %e, "unreadable path during glob expansion");
                    continue;
                }
            };

            if path.is_dir() {
                continue;
            }
            if excludes.iter().any(|ex| ex.matches_path_with(&path, options)) {
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, rel: &str) -> PathBuf {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "x\n").unwrap();
        path
    }

    fn stream(id: &str, paths: Vec<String>, exclude: Vec<String>) -> StreamConfig {
        StreamConfig {
            name: id.to_owned(),
            stream_id: id.to_owned(),
            paths,
            exclude,
            ..Default::default()
        }
    }

    #[test]
    fn finds_matching_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.log");
        touch(&dir, "b.log");
        touch(&dir, "c.txt");

        let files = find_files(&[format!("{}/*.log", dir.path().display())], &[]);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn recursive_wildcard_descends_directories() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "site-a/storage/logs/laravel.log");
        touch(&dir, "site-b/nested/storage/logs/laravel.log");
        touch(&dir, "site-b/storage/cache/data.log");

        let pattern = format!("{}/**/storage/logs/*.log", dir.path().display());
        let files = find_files(&[pattern], &[]);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn exclude_matches_at_any_depth() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "access.log");
        touch(&dir, "access.log.1");
        touch(&dir, "old/access.log.gz");

        let include = vec![
            format!("{}/*", dir.path().display()),
            format!("{}/old/*", dir.path().display()),
        ];
        let exclude = vec!["**/*.gz".to_owned(), "**/*.1".to_owned()];
        let files = find_files(&include, &exclude);
        assert_eq!(files, vec![dir.path().join("access.log")]);
    }

    #[test]
    fn exclude_star_does_not_cross_directories() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "top.log");
        touch(&dir, "nested/inner.log");
        touch(&dir, "nested/deeper/inner.log.gz");

        let include = vec![format!("{}/**/*", dir.path().display())];
        let exclude = vec![
            format!("{}/*.log", dir.path().display()),
            "**/*.gz".to_owned(),
        ];
        let files = find_files(&include, &exclude);
        assert_eq!(files, vec![dir.path().join("nested/inner.log")]);
    }

    #[test]
    fn skips_directories_and_duplicates() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.log");
        fs::create_dir(dir.path().join("dir.log")).unwrap();

        let pattern = format!("{}/*.log", dir.path().display());
        let files = find_files(&[pattern.clone(), pattern], &[]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn malformed_patterns_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.log");

        let include = vec![
            "[unclosed".to_owned(),
            format!("{}/*.log", dir.path().display()),
        ];
        let exclude = vec!["[also-unclosed".to_owned()];
        let files = find_files(&include, &exclude);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn stream_without_destination_is_excluded() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.log");
        let pattern = format!("{}/*.log", dir.path().display());

        let orphan = StreamConfig {
            name: "orphan".to_owned(),
            paths: vec![pattern.clone()],
            ..Default::default()
        };
        let valid = stream("s1", vec![pattern], vec![]);

        let result = discover(&[orphan, valid]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].stream.stream_id, "s1");
    }

    #[test]
    fn url_override_counts_as_destination() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.log");

        let legacy = StreamConfig {
            name: "default".to_owned(),
            paths: vec![format!("{}/*.log", dir.path().display())],
            url: Some("https://ingest.example.com/api/ingest/x".to_owned()),
            ..Default::default()
        };
        assert_eq!(discover(&[legacy]).len(), 1);
    }

    #[test]
    fn stream_with_no_matches_produces_no_entry() {
        let dir = TempDir::new().unwrap();
        let s = stream("s1", vec![format!("{}/*.log", dir.path().display())], vec![]);
        assert!(discover(&[s]).is_empty());
    }

    #[test]
    fn output_follows_stream_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a/x.log");
        touch(&dir, "b/y.log");

        let first = stream("second-in-alpha", vec![format!("{}/b/*.log", dir.path().display())], vec![]);
        let second = stream("first-in-alpha", vec![format!("{}/a/*.log", dir.path().display())], vec![]);

        let result = discover(&[first, second]);
        assert_eq!(result[0].stream.stream_id, "second-in-alpha");
        assert_eq!(result[1].stream.stream_id, "first-in-alpha");
    }
}
