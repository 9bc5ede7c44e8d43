//! Binary storage backends. Uploaded audio, covers, and lyrics live outside
//! the catalog database, addressed by an opaque locator string: a
//! `/uploads/...` path in local mode, a public URL in WebDAV mode.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCategory {
    Tracks,
    Covers,
    Lyrics,
}

impl StorageCategory {
    pub fn as_dir(self) -> &'static str {
        match self {
            StorageCategory::Tracks => "tracks",
            StorageCategory::Covers => "covers",
            StorageCategory::Lyrics => "lyrics",
        }
    }

    pub const ALL: [StorageCategory; 3] =
        [StorageCategory::Tracks, StorageCategory::Covers, StorageCategory::Lyrics];
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores the blob and returns its locator. The original file name only
    /// contributes its extension; stored names are fresh UUIDs.
    async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        category: StorageCategory,
    ) -> Result<String>;

    /// Fetches a stored blob by locator. Absent blobs are an error.
    async fn download(&self, locator: &str) -> Result<Vec<u8>>;

    /// Deleting an already absent blob is not an error.
    async fn delete(&self, locator: &str) -> Result<()>;

    /// Filesystem path for range streaming; `None` for remote backends.
    fn resolve_local(&self, locator: &str) -> Option<PathBuf>;

    /// Remote backends stream via redirect to the locator URL.
    fn is_remote(&self) -> bool;
}

fn extension_of(original_name: &str) -> Option<&str> {
    Path::new(original_name).extension().and_then(|ext| ext.to_str())
}

fn unique_file_name(original_name: &str) -> String {
    match extension_of(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}

pub struct LocalStorage {
    upload_dir: PathBuf,
}

impl LocalStorage {
    pub async fn create(upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        for category in StorageCategory::ALL {
            let dir = upload_dir.join(category.as_dir());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("create upload dir {:?}", dir))?;
        }
        Ok(Self { upload_dir })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn path_for(&self, locator: &str) -> Option<PathBuf> {
        let relative = locator.strip_prefix("/uploads/")?;
        // Locators are server-generated, but never follow a traversal.
        if relative.split('/').any(|part| part == "..") {
            return None;
        }
        Some(self.upload_dir.join(relative))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        category: StorageCategory,
    ) -> Result<String> {
        let file_name = unique_file_name(original_name);
        let path = self.upload_dir.join(category.as_dir()).join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write upload {:?}", path))?;
        Ok(format!("/uploads/{}/{}", category.as_dir(), file_name))
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self
            .path_for(locator)
            .ok_or_else(|| anyhow!("unknown locator {locator}"))?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("read upload {:?}", path))
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        let Some(path) = self.path_for(locator) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("delete upload {:?}", path)),
        }
    }

    fn resolve_local(&self, locator: &str) -> Option<PathBuf> {
        self.path_for(locator)
    }

    fn is_remote(&self) -> bool {
        false
    }
}

pub struct WebDavStorage {
    client: reqwest::Client,
    base_url: String,
    base_path: String,
    public_url: String,
    username: String,
    password: String,
}

impl WebDavStorage {
    pub fn new(
        base_url: &str,
        base_path: &str,
        public_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build webdav client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            base_path: base_path.trim_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn collection_url(&self, category: StorageCategory) -> String {
        format!("{}/{}/{}", self.base_url, self.base_path, category.as_dir())
    }

    /// MKCOL on an existing collection answers 405; anything else refusing
    /// the collection is a real failure.
    async fn ensure_collection(&self, category: StorageCategory) -> Result<()> {
        let mkcol = reqwest::Method::from_bytes(b"MKCOL").context("mkcol method")?;
        let url = self.collection_url(category);
        let response = self
            .client
            .request(mkcol, &url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("mkcol {url}"))?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 405 {
            Ok(())
        } else {
            Err(anyhow!("mkcol {url} answered {status}"))
        }
    }

    fn remote_url_for(&self, locator: &str) -> Option<String> {
        let relative = locator.strip_prefix(&self.public_url)?;
        let relative = relative.trim_start_matches('/');
        let encoded = relative
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}/{}", self.base_url, self.base_path, encoded))
    }
}

#[async_trait]
impl StorageBackend for WebDavStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        category: StorageCategory,
    ) -> Result<String> {
        self.ensure_collection(category).await?;
        let file_name = unique_file_name(original_name);
        let url = format!(
            "{}/{}",
            self.collection_url(category),
            urlencoding::encode(&file_name)
        );
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .body(bytes.to_vec())
            .send()
            .await
            .with_context(|| format!("put {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("put {url} answered {status}"));
        }
        Ok(format!("{}/{}/{}", self.public_url, category.as_dir(), file_name))
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>> {
        let url = self
            .remote_url_for(locator)
            .ok_or_else(|| anyhow!("unknown locator {locator}"))?;
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("get {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("get {url} answered {status}"));
        }
        let bytes = response.bytes().await.with_context(|| format!("read {url}"))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        let Some(url) = self.remote_url_for(locator) else {
            return Ok(());
        };
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("delete {url}"))?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            Err(anyhow!("delete {url} answered {status}"))
        }
    }

    fn resolve_local(&self, _locator: &str) -> Option<PathBuf> {
        None
    }

    fn is_remote(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory backend for orchestrator tests.
    pub struct MemoryStorage {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        counter: AtomicU64,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            MemoryStorage { blobs: Mutex::new(HashMap::new()), counter: AtomicU64::new(0) }
        }

        pub fn blob_count(&self) -> usize {
            self.blobs.lock().unwrap().len()
        }

        pub fn locators(&self) -> Vec<String> {
            let mut locators: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
            locators.sort();
            locators
        }
    }

    #[async_trait]
    impl StorageBackend for MemoryStorage {
        async fn upload(
            &self,
            bytes: &[u8],
            _original_name: &str,
            category: StorageCategory,
        ) -> Result<String> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let locator = format!("mem://{}/{}", category.as_dir(), n);
            self.blobs.lock().unwrap().insert(locator.clone(), bytes.to_vec());
            Ok(locator)
        }

        async fn download(&self, locator: &str) -> Result<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(locator)
                .cloned()
                .ok_or_else(|| anyhow!("unknown locator {locator}"))
        }

        async fn delete(&self, locator: &str) -> Result<()> {
            self.blobs.lock().unwrap().remove(locator);
            Ok(())
        }

        fn resolve_local(&self, _locator: &str) -> Option<PathBuf> {
            None
        }

        fn is_remote(&self) -> bool {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flacvault-storage-{tag}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn local_upload_writes_under_category_with_uuid_name() {
        let dir = temp_dir("upload");
        let storage = LocalStorage::create(&dir).await.expect("create");
        let locator = storage
            .upload(b"flac-bytes", "My Song.FLAC", StorageCategory::Tracks)
            .await
            .expect("upload");

        assert!(locator.starts_with("/uploads/tracks/"));
        assert!(locator.ends_with(".flac"));
        let path = storage.resolve_local(&locator).expect("resolve");
        let stored = std::fs::read(&path).expect("read back");
        assert_eq!(stored, b"flac-bytes");
        let fetched = storage.download(&locator).await.expect("download");
        assert_eq!(fetched, b"flac-bytes");
        assert!(storage.download("/uploads/lyrics/missing.lrc").await.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn local_delete_of_missing_blob_is_ok() {
        let dir = temp_dir("delete");
        let storage = LocalStorage::create(&dir).await.expect("create");
        storage
            .delete("/uploads/covers/does-not-exist.jpg")
            .await
            .expect("delete absent");
        storage.delete("not-a-locator").await.expect("foreign locator");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn local_delete_removes_the_blob() {
        let dir = temp_dir("roundtrip");
        let storage = LocalStorage::create(&dir).await.expect("create");
        let locator = storage
            .upload(b"img", "c.png", StorageCategory::Covers)
            .await
            .expect("upload");
        let path = storage.resolve_local(&locator).expect("resolve");
        assert!(path.exists());
        storage.delete(&locator).await.expect("delete");
        assert!(!path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn traversal_locators_do_not_resolve() {
        let storage = LocalStorage {
            upload_dir: PathBuf::from("/srv/uploads"),
        };
        assert!(storage.resolve_local("/uploads/../etc/passwd").is_none());
        assert!(storage.resolve_local("/elsewhere/x").is_none());
    }

    #[test]
    fn webdav_locator_maps_back_to_remote_url() {
        let storage = WebDavStorage::new(
            "https://dav.example.com/remote.php/dav",
            "music/",
            "https://cdn.example.com/music",
            "u",
            "p",
        )
        .expect("build");
        let url = storage
            .remote_url_for("https://cdn.example.com/music/tracks/abc.flac")
            .expect("map");
        assert_eq!(url, "https://dav.example.com/remote.php/dav/music/tracks/abc.flac");
        assert!(storage.remote_url_for("https://other.example.com/x").is_none());
    }
}
