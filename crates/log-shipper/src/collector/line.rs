//! 길이 제한 라인 버퍼
//!
//! `read_until`은 개행이 올 때까지 전부 메모리에 쌓기 때문에, 개행 없는
//! 거대한 입력 하나로 메모리가 무한히 늘어날 수 있습니다. [`LineBuffer`]는
//! `fill_buf`/`consume`으로 읽으며 최대 길이까지만 보관하고 나머지는
//! 다음 개행까지 버립니다.

use std::io;
use std::mem;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// [`LineBuffer::read_from`] 한 번의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Filled {
    /// 이번 호출에서 소스로부터 소비한 바이트 수 (버린 바이트 포함)
    pub read: u64,
    /// 개행까지 읽어 라인이 완성되었는지
    pub complete: bool,
}

/// 최대 `max_len` 바이트까지만 보관하는 라인 버퍼
#[derive(Debug)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
    max_len: usize,
    truncated: bool,
    /// 현재 라인에 대해 소스에서 소비한 바이트 수
    consumed: u64,
}

impl LineBuffer {
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max_len,
            truncated: false,
            consumed: 0,
        }
    }

    /// 개행을 만나거나 읽을 데이터가 없을 때까지 읽습니다.
    ///
    /// 개행 자체는 보관하지 않습니다.
    pub(crate) async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<Filled>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut read = 0u64;
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(Filled {
                    read,
                    complete: false,
                });
            }

            let (used, content, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, &available[..i], true),
                None => (available.len(), available, false),
            };

            let room = self.max_len.saturating_sub(self.bytes.len());
            if content.len() > room {
                self.truncated = true;
            }
            self.bytes
                .extend_from_slice(&content[..content.len().min(room)]);

            reader.consume(used);
            read += used as u64;
            self.consumed += used as u64;

            if complete {
                return Ok(Filled {
                    read,
                    complete: true,
                });
            }
        }
    }

    /// 보관한 라인을 꺼냅니다. 끝의 `\r`은 제거하며, 잘렸는지 여부를 함께 반환합니다.
    pub(crate) fn take(&mut self) -> (Vec<u8>, bool) {
        let mut bytes = mem::take(&mut self.bytes);
        while matches!(bytes.last(), Some(b'\n' | b'\r')) {
            bytes.pop();
        }
        self.consumed = 0;
        (bytes, mem::take(&mut self.truncated))
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
        self.truncated = false;
        self.consumed = 0;
    }

    /// 보관 중인 바이트 수 (항상 `max_len` 이하)
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// 아직 완성되지 않은 라인에 대해 소비한 바이트 수
    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn splits_lines_and_strips_carriage_return() {
        let mut reader: &[u8] = b"first\r\nsecond\n";
        let mut line = LineBuffer::new(64);

        let filled = line.read_from(&mut reader).await.unwrap();
        assert_eq!(filled, Filled { read: 7, complete: true });
        assert_eq!(line.take(), (b"first".to_vec(), false));

        let filled = line.read_from(&mut reader).await.unwrap();
        assert_eq!(filled, Filled { read: 7, complete: true });
        assert_eq!(line.take().0, b"second".to_vec());

        let filled = line.read_from(&mut reader).await.unwrap();
        assert_eq!(filled, Filled { read: 0, complete: false });
    }

    #[tokio::test]
    async fn oversized_input_without_newline_stays_bounded() {
        let data = vec![b'x'; 100_000];
        // 작은 내부 버퍼로 여러 번 나눠 읽히게 함
        let mut reader = BufReader::with_capacity(64, data.as_slice());
        let mut line = LineBuffer::new(16);

        let filled = line.read_from(&mut reader).await.unwrap();
        assert_eq!(filled, Filled { read: 100_000, complete: false });
        assert_eq!(line.len(), 16);
        assert_eq!(line.consumed(), 100_000);

        let mut rest: &[u8] = b"yyy\nnext\n";
        let filled = line.read_from(&mut rest).await.unwrap();
        assert!(filled.complete);
        let (bytes, truncated) = line.take();
        assert_eq!(bytes, vec![b'x'; 16]);
        assert!(truncated);

        // 다음 라인은 잘림 표시 없이 시작
        line.read_from(&mut rest).await.unwrap();
        assert_eq!(line.take(), (b"next".to_vec(), false));
    }

    #[tokio::test]
    async fn partial_line_is_kept_across_reads() {
        let mut line = LineBuffer::new(64);
        let mut head: &[u8] = b"hel";
        let filled = line.read_from(&mut head).await.unwrap();
        assert!(!filled.complete);
        assert_eq!(line.consumed(), 3);

        let mut tail: &[u8] = b"lo\n";
        assert!(line.read_from(&mut tail).await.unwrap().complete);
        assert_eq!(line.take().0, b"hello".to_vec());
        assert_eq!(line.consumed(), 0);
    }
}
