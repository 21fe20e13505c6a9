//! Object store: read-only source (delegates to `git cat-file --batch`) and
//! read-write target (loose objects on disk) — spec §4.A.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use scopeguard::guard;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::commit::Commit;
use crate::object::model::{ObjectKind, Tree};

/// Read/write access to objects of a single kind-agnostic store.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read(&self, hash: ObjectHash) -> Result<(ObjectKind, Vec<u8>), GraftError>;

    async fn read_typed(
        &self,
        hash: ObjectHash,
        expected: ObjectKind,
    ) -> Result<Vec<u8>, GraftError> {
        let (kind, payload) = self.read(hash).await?;
        if kind != expected {
            return Err(GraftError::TypeMismatch {
                hash,
                expected: expected.as_str(),
                actual: kind.as_str().to_string(),
            });
        }
        Ok(payload)
    }

    async fn read_blob(&self, hash: ObjectHash) -> Result<Vec<u8>, GraftError> {
        self.read_typed(hash, ObjectKind::Blob).await
    }

    async fn read_tree(&self, hash: ObjectHash) -> Result<Tree, GraftError> {
        let payload = self.read_typed(hash, ObjectKind::Tree).await?;
        Tree::parse(&payload)
    }

    async fn read_commit(&self, hash: ObjectHash) -> Result<Commit, GraftError> {
        let payload = self.read_typed(hash, ObjectKind::Commit).await?;
        Commit::parse(&payload)
    }
}

/// Reads objects (loose or packed) of any form by driving a long-running
/// `git cat-file --batch` helper process. Not thread-safe: the protocol is
/// strictly request/response over one pair of pipes, so each concurrent
/// reader must own its own helper (spec §4.A, §5 "one per worker").
pub struct SourceStore {
    _child: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
}

impl SourceStore {
    pub fn spawn(repo_dir: &Path) -> Result<Self, GraftError> {
        let mut child = Command::new("git")
            .arg("cat-file")
            .arg("--batch")
            .current_dir(repo_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GraftError::Protocol("cat-file: no stdin handle".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GraftError::Protocol("cat-file: no stdout handle".into()))?;

        Ok(Self {
            _child: child,
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
        })
    }

    async fn request(&self, hash: ObjectHash) -> Result<(ObjectKind, Vec<u8>), GraftError> {
        // Hold both handles for the duration of one request/response so that
        // a concurrent caller on the same store can't interleave frames.
        let mut stdin = self.stdin.lock().await;
        let mut stdout = self.stdout.lock().await;

        stdin
            .write_all(format!("{}\n", hash.to_hex()).as_bytes())
            .await?;
        stdin.flush().await?;

        let mut header = String::new();
        stdout.read_line(&mut header).await?;
        let header = header.trim_end_matches(['\r', '\n']);
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(GraftError::Protocol(format!(
                "cat-file: malformed header line {header:?}"
            )));
        }
        let [ret_hash, kind_str, size_str] = [parts[0], parts[1], parts[2]];
        if ret_hash != hash.to_hex() {
            return Err(GraftError::Protocol(format!(
                "cat-file: requested {hash} but got {ret_hash}"
            )));
        }
        let kind = ObjectKind::parse(kind_str)
            .ok_or_else(|| GraftError::Protocol(format!("cat-file: unknown type {kind_str}")))?;
        let size: usize = size_str
            .parse()
            .map_err(|_| GraftError::Protocol(format!("cat-file: bad size {size_str:?}")))?;

        let mut payload = vec![0u8; size];
        stdout.read_exact(&mut payload).await?;
        if size != payload.len() {
            return Err(GraftError::Protocol(format!(
                "cat-file: size mismatch for {hash}: header said {size}, read {}",
                payload.len()
            )));
        }

        let mut trailer = [0u8; 1];
        stdout.read_exact(&mut trailer).await?;
        if trailer[0] != b'\n' {
            return Err(GraftError::Protocol(format!(
                "cat-file: missing trailing newline after {hash}"
            )));
        }

        Ok((kind, payload))
    }
}

#[async_trait::async_trait]
impl ObjectStore for SourceStore {
    async fn read(&self, hash: ObjectHash) -> Result<(ObjectKind, Vec<u8>), GraftError> {
        self.request(hash).await
    }
}

/// Read-write loose-object directory: `<root>/<xx>/<remaining-38-hex>`.
/// Writes are content-addressed and idempotent; existing files are never
/// rewritten. Writes are atomic via a `<pid>-<nonce>.tmp` + rename, matching
/// `gitutils.py`'s `WriteFileAtomic` (the nonce replaces reliance on PID
/// alone, since multiple async tasks in one process share a PID).
#[derive(Clone)]
pub struct TargetStore {
    root: PathBuf,
}

impl TargetStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, hash: ObjectHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..])
    }

    pub fn exists(&self, hash: ObjectHash) -> bool {
        self.object_path(hash).exists()
    }

    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectHash, GraftError> {
        let hash = ObjectHash::of_object(kind.as_str(), payload);
        let path = self.object_path(hash);
        if path.exists() {
            return Ok(hash);
        }
        let dir = path
            .parent()
            .expect("object path always has a fan-out parent");
        std::fs::create_dir_all(dir)?;

        let mut framed = Vec::with_capacity(payload.len() + 16);
        framed.extend_from_slice(kind.as_str().as_bytes());
        framed.push(b' ');
        framed.extend_from_slice(payload.len().to_string().as_bytes());
        framed.push(0);
        framed.extend_from_slice(payload);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&framed)?;
        let compressed = encoder.finish()?;

        let tmp_path = dir.join(format!(
            "{}-{}-{}.tmp",
            path.file_name().unwrap().to_string_lossy(),
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        // Best-effort cleanup if the rename below never happens.
        let tmp_guard = guard(tmp_path.clone(), |p| {
            let _ = std::fs::remove_file(p);
        });
        std::fs::write(&*tmp_guard, &compressed)?;
        std::fs::rename(&*tmp_guard, &path)?;
        std::mem::forget(tmp_guard); // renamed away; nothing left to clean up

        Ok(hash)
    }

    fn read_raw(&self, hash: ObjectHash) -> Result<(ObjectKind, Vec<u8>), GraftError> {
        let path = self.object_path(hash);
        let compressed = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GraftError::NotFound(format!("object {hash} not found in {}", self.root.display()))
            } else {
                GraftError::Io(e)
            }
        })?;

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut framed = Vec::new();
        decoder.read_to_end(&mut framed)?;

        let nul = framed
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GraftError::Protocol(format!("object {hash}: missing header NUL")))?;
        let header = std::str::from_utf8(&framed[..nul])
            .map_err(|e| GraftError::Protocol(format!("object {hash}: non-utf8 header: {e}")))?;
        let (kind_str, len_str) = header
            .split_once(' ')
            .ok_or_else(|| GraftError::Protocol(format!("object {hash}: malformed header")))?;
        let kind = ObjectKind::parse(kind_str)
            .ok_or_else(|| GraftError::Protocol(format!("object {hash}: unknown type {kind_str}")))?;
        let declared_len: usize = len_str
            .parse()
            .map_err(|_| GraftError::Protocol(format!("object {hash}: bad length {len_str:?}")))?;

        let payload = framed[nul + 1..].to_vec();
        if payload.len() != declared_len {
            return Err(GraftError::Protocol(format!(
                "object {hash}: declared length {declared_len} does not match payload length {}",
                payload.len()
            )));
        }

        let recomputed = ObjectHash::of_object(kind.as_str(), &payload);
        if recomputed != hash {
            return Err(GraftError::Integrity {
                hash,
                actual: recomputed,
            });
        }

        Ok((kind, payload))
    }
}

#[async_trait::async_trait]
impl ObjectStore for TargetStore {
    async fn read(&self, hash: ObjectHash) -> Result<(ObjectKind, Vec<u8>), GraftError> {
        self.read_raw(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().to_path_buf());
        let hash = store.write(ObjectKind::Blob, b"hello").unwrap();
        let payload = store.read_blob(hash).await.unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn writing_same_content_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().to_path_buf());
        let h1 = store.write(ObjectKind::Blob, b"hello").unwrap();
        let h2 = store.write(ObjectKind::Blob, b"hello").unwrap();
        assert_eq!(h1, h2);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().to_path_buf());
        let hash = store.write(ObjectKind::Blob, b"hello").unwrap();
        let err = store.read_tree(hash).await.unwrap_err();
        assert!(matches!(err, GraftError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().to_path_buf());
        let hash = ObjectHash::of_object("blob", b"nonexistent");
        let err = store.read(hash).await.unwrap_err();
        assert!(matches!(err, GraftError::NotFound(_)));
    }
}
