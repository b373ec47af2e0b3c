use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use mojimirror_engine::{
    asset_file_name, build_download_targets, inventory_key, list_inventory, numbered_file_name,
    read_run_metadata, write_run_metadata, ListingEntry, METADATA_FILENAME,
};

#[test]
fn file_names_come_from_the_decoded_final_path_segment() {
    assert_eq!(
        asset_file_name("https://emojis.example.com/emojis/party%20parrot.gif?1530"),
        "party parrot.gif"
    );
    assert_eq!(asset_file_name("/emojis/smile.gif"), "smile.gif");
    assert_eq!(asset_file_name("emojis/smile.gif"), "smile.gif");
}

#[test]
fn collision_suffix_lands_before_the_extension() {
    assert_eq!(numbered_file_name("smile.gif", 0), "smile.gif");
    assert_eq!(numbered_file_name("smile.gif", 1), "smile-1.gif");
    assert_eq!(numbered_file_name("smile.gif", 2), "smile-2.gif");
    assert_eq!(numbered_file_name("archive.tar.gz", 1), "archive.tar-1.gz");
    assert_eq!(numbered_file_name(".gitignore", 1), ".gitignore-1");
    assert_eq!(numbered_file_name("noext", 1), "noext-1");
}

#[test]
fn targets_skip_unusable_entries_and_honor_the_category_filter() {
    let entries: Vec<ListingEntry> = serde_json::from_value(json!([
        {
            "id": 1,
            "name": "parrot",
            "image_url": "https://emojis.example.com/emojis/parrot.gif",
            "category": { "name": "Party Parrot" }
        },
        {
            "id": 2,
            "name": "meme",
            "image_url": "https://emojis.example.com/emojis/meme.gif",
            "category": { "name": "Meme" }
        },
        {
            "id": 3,
            "name": "blank category",
            "image_url": "https://emojis.example.com/emojis/x.gif",
            "category": { "name": "  " }
        },
        {
            "id": 4,
            "name": "no category",
            "image_url": "https://emojis.example.com/emojis/y.gif"
        },
        {
            "id": 5,
            "name": "no url",
            "image_url": "",
            "category": { "name": "Meme" }
        }
    ]))
    .expect("lenient listing parse");

    let all = build_download_targets(&entries, None, Path::new("/mirror"));
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].file_name, "parrot.gif");
    assert_eq!(all[0].dir, Path::new("/mirror/Party Parrot"));

    let memes = build_download_targets(&entries, Some("Meme"), Path::new("/mirror"));
    assert_eq!(memes.len(), 1);
    assert_eq!(memes[0].category, "Meme");
    assert_eq!(inventory_key(&memes[0].category, &memes[0].file_name), "Meme/meme.gif");
}

#[test]
fn inventory_lists_relative_paths_under_the_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("Meme")).unwrap();
    std::fs::create_dir_all(root.join("Party Parrot")).unwrap();
    std::fs::write(root.join("Meme/a.gif"), b"x").unwrap();
    std::fs::write(root.join("Party Parrot/b.png"), b"x").unwrap();
    std::fs::write(root.join(METADATA_FILENAME), b"{}").unwrap();

    let mut keys = list_inventory(root);
    keys.sort();
    // The metadata file is hidden and never part of the inventory.
    assert_eq!(
        keys,
        vec!["Meme/a.gif".to_string(), "Party Parrot/b.png".to_string()]
    );

    assert!(list_inventory(Path::new("/does/not/exist")).is_empty());
}

#[tokio::test]
async fn metadata_round_trips_and_tolerates_absence() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    assert!(read_run_metadata(root).await.expect("missing is fine").is_none());

    write_run_metadata(root, 42).await.expect("write");
    let metadata = read_run_metadata(root)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(metadata.last_page, 42);
    assert!(metadata.updated_at.is_some());

    let raw = std::fs::read_to_string(root.join(METADATA_FILENAME)).unwrap();
    assert!(raw.contains("\"lastPage\": 42"));

    std::fs::write(root.join(METADATA_FILENAME), "not json").unwrap();
    assert!(read_run_metadata(root).await.is_err());
}
