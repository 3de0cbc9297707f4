mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use client::documents::{DocumentKind, DocumentNode, ImageMigrator};
use client::etag::etag_from_bytes;
use client::transfer::AssetUploader;
use serde_json::json;

use common::MockAssetService;

fn migrator(service: Arc<MockAssetService>) -> ImageMigrator {
    ImageMigrator::new(Arc::new(AssetUploader::new(service)))
}

fn data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

fn stored_url(kind: DocumentKind, bytes: &[u8]) -> String {
    // Mirrors the mock's transfer URL for the content-addressed name.
    format!(
        "https://assets.example.com/u/base64data/{}/{}.png",
        kind.as_str(),
        etag_from_bytes(bytes)
    )
}

#[tokio::test]
async fn test_item_image_and_embedded_html_are_rewritten() {
    let service = Arc::new(MockAssetService::default());
    let icon = b"icon bytes";
    let embedded = b"embedded bytes";
    let value = json!({
        "name": "Wand",
        "img": data_url(icon),
        "system": {
            "description": {
                "value": format!(
                    "<p>A wand.</p><img src=\"{}\" alt=\"wand\">",
                    data_url(embedded)
                )
            }
        }
    });

    let node = DocumentNode::from_value(DocumentKind::Item, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::Item(item) = migrated else {
        panic!("expected an item");
    };

    assert_eq!(
        item.img.as_deref(),
        Some(stored_url(DocumentKind::Item, icon).as_str())
    );
    let description = item
        .system
        .unwrap()
        .description
        .unwrap()
        .value
        .unwrap();
    assert_eq!(
        description,
        format!(
            "<p>A wand.</p><img src=\"{}\" alt=\"wand\">",
            stored_url(DocumentKind::Item, embedded)
        )
    );
    assert_eq!(service.transfer_count(), 2);
}

#[tokio::test]
async fn test_legacy_item_description_is_migrated() {
    let service = Arc::new(MockAssetService::default());
    let embedded = b"legacy bytes";
    // Pre-v10 documents carry the description under `data`.
    let value = json!({
        "img": "icons/sword.png",
        "data": {
            "description": {
                "value": format!("<img src=\"{}\">", data_url(embedded))
            }
        }
    });

    let node = DocumentNode::from_value(DocumentKind::Item, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::Item(item) = migrated else {
        panic!("expected an item");
    };

    let description = item.data.unwrap().description.unwrap().value.unwrap();
    assert_eq!(
        description,
        format!("<img src=\"{}\">", stored_url(DocumentKind::Item, embedded))
    );
    assert!(!description.contains("data:image/"));
}

#[tokio::test]
async fn test_legacy_actor_biography_is_migrated() {
    let service = Arc::new(MockAssetService::default());
    let portrait = b"biography bytes";
    let value = json!({
        "img": "actors/hero.png",
        "data": {
            "details": {
                "biography": {
                    "value": format!("<img src='{}'>", data_url(portrait))
                }
            }
        }
    });

    let node = DocumentNode::from_value(DocumentKind::Actor, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::Actor(actor) = migrated else {
        panic!("expected an actor");
    };

    let biography = actor
        .data
        .unwrap()
        .details
        .unwrap()
        .biography
        .unwrap()
        .value
        .unwrap();
    assert!(biography.contains(&stored_url(DocumentKind::Actor, portrait)));
    assert!(!biography.contains("data:image/"));
}

#[tokio::test]
async fn test_plain_paths_pass_through_untouched() {
    let service = Arc::new(MockAssetService::default());
    let value = json!({
        "img": "icons/sword.png",
        "system": {
            "description": {"value": "<img src='icons/a.png'> plain"}
        }
    });

    let node = DocumentNode::from_value(DocumentKind::Item, value.clone()).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;

    assert_eq!(migrated.into_value().unwrap(), value);
    assert_eq!(service.transfer_count(), 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_the_data_url() {
    let service = Arc::new(MockAssetService::default());
    service
        .fail_transfers
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let url = data_url(b"doomed");
    let value = json!({ "img": url });

    let node = DocumentNode::from_value(DocumentKind::Tile, value).unwrap();
    let migrated = migrator(service).migrate(node).await;
    let DocumentNode::Tile(tile) = migrated else {
        panic!("expected a tile");
    };

    assert_eq!(tile.img.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_identical_images_dedup_across_fields() {
    let service = Arc::new(MockAssetService::default());
    let bytes = b"shared texture";
    let value = json!({
        "tokens": [
            {"texture": {"src": data_url(bytes)}},
            {"texture": {"src": data_url(bytes)}}
        ]
    });

    let node = DocumentNode::from_value(DocumentKind::Scene, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::Scene(scene) = migrated else {
        panic!("expected a scene");
    };

    let tokens = scene.tokens.unwrap();
    let first = tokens[0].texture.as_ref().unwrap().src.clone().unwrap();
    let second = tokens[1].texture.as_ref().unwrap().src.clone().unwrap();
    assert!(first.starts_with("https://"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_modern_journal_migrates_pages() {
    let service = Arc::new(MockAssetService::default());
    let header = b"header image";
    let value = json!({
        "name": "Lore",
        "pages": [{
            "src": data_url(header),
            "text": {
                "content": "<p>No images here.</p>",
                "markdown": format!("![map]({})", data_url(b"map")),
            }
        }]
    });

    let node = DocumentNode::from_value(DocumentKind::JournalEntry, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::JournalEntry(journal) = migrated else {
        panic!("expected a journal entry");
    };

    let page = &journal.pages.unwrap()[0];
    assert_eq!(
        page.src.as_deref(),
        Some(stored_url(DocumentKind::JournalEntryPage, header).as_str())
    );
    let markdown = page.text.as_ref().unwrap().markdown.clone().unwrap();
    assert!(markdown.starts_with("![map](https://"));
    assert!(!markdown.contains("data:image/"));
}

#[tokio::test]
async fn test_oversized_media_parameters_pass_through() {
    let service = Arc::new(MockAssetService::default());
    // Parameter string longer than anything we would emit.
    let url = "data:image/png;charset=utf-8;base64,QUFBQQ==".to_string();
    let value = json!({ "img": url });

    let node = DocumentNode::from_value(DocumentKind::Macro, value).unwrap();
    let migrated = migrator(service.clone()).migrate(node).await;
    let DocumentNode::Macro(doc) = migrated else {
        panic!("expected a macro");
    };

    assert_eq!(doc.img.as_deref(), Some(url.as_str()));
    assert_eq!(service.transfer_count(), 0);
}
