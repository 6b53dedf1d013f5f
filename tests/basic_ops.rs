mod common;

use bytes::Bytes;
use common::{sorted, Fixture};
use omnifs::backend::FsConfig;
use omnifs::error::ErrorKind;
use omnifs::options::{
    HeadOptions, ListOptions, MkcolOptions, OpenReadOptions, OpenWriteOptions, PatchOptions,
    UrlKind,
};
use omnifs::stats::Props;
use omnifs::Entry;

#[tokio::test]
async fn empty_file_create() {
    let fixture = Fixture::new();
    let written = fixture
        .fs
        .write("/empty.txt", "", &OpenWriteOptions::default())
        .await
        .expect("write succeeds");
    assert!(written);
    let stats = fixture.fs.head("/empty.txt", &HeadOptions::default()).await.expect("head");
    assert_eq!(stats.size, Some(0));
    let content = fixture.fs.read("/empty.txt", &OpenReadOptions::default()).await.expect("read");
    assert!(content.is_empty());
}

#[tokio::test]
async fn small_text_round_trip() {
    let fixture = Fixture::new();
    fixture.fs.write("/test.txt", "test", &OpenWriteOptions::default()).await.unwrap();
    let content = fixture.fs.read("/test.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(content, Bytes::from_static(b"test"));
    let stats = fixture.fs.head("/test.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.size, Some(4));
    let text = fixture.fs.read_text("/test.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(text, "test");
}

#[tokio::test]
async fn directory_round_trip() {
    let fixture = Fixture::new();
    fixture.fs.write("/empty.txt", "", &OpenWriteOptions::default()).await.unwrap();
    fixture.fs.write("/test.txt", "test", &OpenWriteOptions::default()).await.unwrap();
    fixture.fs.write("/otani.txt", "大谷翔平", &OpenWriteOptions::default()).await.unwrap();
    let created = fixture.fs.mkcol("/folder", &MkcolOptions::default()).await.unwrap();
    assert!(created);

    let listed = fixture.fs.list("/", &ListOptions::default()).await.unwrap();
    assert_eq!(
        sorted(listed),
        vec![
            "/empty.txt".to_owned(),
            "/folder".to_owned(),
            "/otani.txt".to_owned(),
            "/test.txt".to_owned(),
        ]
    );
    let stats = fixture.fs.head("/folder", &HeadOptions::default()).await.unwrap();
    assert!(stats.is_directory());
}

#[tokio::test]
async fn utf8_content_sizes_in_bytes() {
    let fixture = Fixture::new();
    fixture.fs.write("/otani.txt", "大谷翔平", &OpenWriteOptions::default()).await.unwrap();
    let stats = fixture.fs.head("/otani.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.size, Some(12));
    let text = fixture.fs.read_text("/otani.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(text, "大谷翔平");
}

#[tokio::test]
async fn range_read_native() {
    let fixture = Fixture::new();
    fixture.fs.write("/digits.txt", "0123456789", &OpenWriteOptions::default()).await.unwrap();
    let options = OpenReadOptions { start: Some(2), length: Some(3), ..Default::default() };
    let content = fixture.fs.read("/digits.txt", &options).await.unwrap();
    assert_eq!(content, Bytes::from_static(b"234"));
    // A zero-length request is empty without touching the backend range.
    let options = OpenReadOptions { length: Some(0), ..Default::default() };
    let content = fixture.fs.read("/digits.txt", &options).await.unwrap();
    assert!(content.is_empty());
}

#[tokio::test]
async fn range_write_native() {
    let fixture = Fixture::new();
    fixture.fs.write("/digits.txt", "0123456789", &OpenWriteOptions::default()).await.unwrap();
    let options = OpenWriteOptions { start: Some(2), ..Default::default() };
    fixture.fs.write("/digits.txt", "abc", &options).await.unwrap();
    let text = fixture.fs.read_text("/digits.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(text, "01abc56789");
    let stats = fixture.fs.head("/digits.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.size, Some(10));
}

#[tokio::test]
async fn append_write_native() {
    let fixture = Fixture::new();
    fixture.fs.write("/log.txt", "alpha", &OpenWriteOptions::default()).await.unwrap();
    let append = OpenWriteOptions { append: true, ..Default::default() };
    fixture.fs.write("/log.txt", "beta", &append).await.unwrap();
    let text = fixture.fs.read_text("/log.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(text, "alphabeta");
}

#[tokio::test]
async fn write_overwrites_by_default() {
    let fixture = Fixture::new();
    fixture.fs.write("/note.txt", "first version", &OpenWriteOptions::default()).await.unwrap();
    fixture.fs.write("/note.txt", "second", &OpenWriteOptions::default()).await.unwrap();
    let text = fixture.fs.read_text("/note.txt", &OpenReadOptions::default()).await.unwrap();
    assert_eq!(text, "second");
    let stats = fixture.fs.head("/note.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.size, Some(6));
}

#[tokio::test]
async fn zero_length_write_is_a_no_op() {
    let fixture = Fixture::new();
    let options = OpenWriteOptions { length: Some(0), ..Default::default() };
    let written = fixture.fs.write("/nothing.txt", "payload", &options).await.unwrap();
    assert!(!written);
    assert!(!fixture.fs.exists("/nothing.txt").await.unwrap());
}

#[tokio::test]
async fn exists_and_get_entry() {
    let fixture = Fixture::new();
    fixture.fs.write("/a.txt", "a", &OpenWriteOptions::default()).await.unwrap();
    fixture.fs.mkcol("/dir", &MkcolOptions::default()).await.unwrap();
    assert!(fixture.fs.exists("/a.txt").await.unwrap());
    assert!(!fixture.fs.exists("/missing").await.unwrap());

    let entry = fixture.fs.get_entry("/a.txt", &HeadOptions::default()).await.unwrap();
    assert!(matches!(entry, Entry::File(_)));
    assert_eq!(entry.to_string(), "test:/a.txt");
    let entry = fixture.fs.get_entry("/dir", &HeadOptions::default()).await.unwrap();
    assert!(matches!(entry, Entry::Directory(_)));
    assert_eq!(entry.name(), "dir");
    assert_eq!(entry.parent().path(), "/");
}

#[tokio::test]
async fn paths_are_normalized_on_entry() {
    let fixture = Fixture::new();
    fixture.fs.mkcol("/dir", &MkcolOptions::default()).await.unwrap();
    fixture.fs.write("/dir/../a.txt", "a", &OpenWriteOptions::default()).await.unwrap();
    assert!(fixture.fs.exists("/a.txt").await.unwrap());
    let file = fixture.fs.file("//dir//..//a.txt").unwrap();
    assert_eq!(file.path(), "/a.txt");
    assert_eq!(file.to_string(), "test:/a.txt");
}

#[tokio::test]
async fn patch_merges_over_current_stats() {
    let fixture = Fixture::new();
    fixture.fs.write("/meta.txt", "meta", &OpenWriteOptions::default()).await.unwrap();
    let mut props = Props::default();
    props.stats.modified = Some(1_234_567);
    fixture.fs.patch("/meta.txt", &props, &PatchOptions::default()).await.unwrap();
    let stats = fixture.fs.head("/meta.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.modified, Some(1_234_567));
    // Untouched fields keep their values.
    assert_eq!(stats.size, Some(4));
    assert!(stats.created.is_some());
}

#[tokio::test]
async fn mkcol_force_and_recursive() {
    let fixture = Fixture::new();
    assert!(fixture.fs.mkcol("/dir", &MkcolOptions::default()).await.unwrap());
    // Existing directory with force reports "not newly created".
    let force = MkcolOptions { force: true, ..Default::default() };
    assert!(!fixture.fs.mkcol("/dir", &force).await.unwrap());
    // Recursive creation builds the whole chain.
    let recursive = MkcolOptions { recursive: true, ..Default::default() };
    assert!(fixture.fs.mkcol("/a/b/c", &recursive).await.unwrap());
    assert!(fixture.fs.exists("/a").await.unwrap());
    assert!(fixture.fs.exists("/a/b").await.unwrap());
    let listed = fixture.fs.list("/a/b", &ListOptions::default()).await.unwrap();
    assert_eq!(listed, vec!["/a/b/c".to_owned()]);
}

#[tokio::test]
async fn to_url_delegates_to_backend() {
    let fixture = Fixture::new();
    fixture.fs.write("/a.txt", "a", &OpenWriteOptions::default()).await.unwrap();
    let url = fixture.fs.to_url("/a.txt", UrlKind::Get).await.unwrap();
    assert_eq!(url, "memory://test/a.txt");
    let error = fixture.fs.to_url("/a.txt", UrlKind::Put).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotSupported);
}

#[tokio::test]
async fn logical_delete_masks_head() {
    let fixture = Fixture::with(
        FsConfig::default().with_logical_delete(),
        common::Capabilities::full(),
    );
    fixture.fs.write("/ghost.txt", "boo", &OpenWriteOptions::default()).await.unwrap();
    let mut props = Props::default();
    props.stats.deleted = Some(1_700_000_000_000);
    fixture.fs.patch("/ghost.txt", &props, &PatchOptions::default()).await.unwrap();

    let error = fixture.fs.head("/ghost.txt", &HeadOptions::default()).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert!(!fixture.fs.exists("/ghost.txt").await.unwrap());
}

#[tokio::test]
async fn stats_expose_tombstone_without_logical_delete() {
    let fixture = Fixture::new();
    fixture.fs.write("/kept.txt", "kept", &OpenWriteOptions::default()).await.unwrap();
    let mut props = Props::default();
    props.stats.deleted = Some(42);
    fixture.fs.patch("/kept.txt", &props, &PatchOptions::default()).await.unwrap();
    let stats = fixture.fs.head("/kept.txt", &HeadOptions::default()).await.unwrap();
    assert_eq!(stats.deleted, Some(42));
}
